//! Flash Parameter Record
//!
//! Single-instance record of flash geometry, timing, ECC coefficients, and
//! in-flash-computing toggles. Loaded once at startup from an attribute
//! document, read-only afterwards; components borrow it rather than reaching
//! into global state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::{AttributeElement, DocumentError};
use crate::SimTimeNs;

/// Element name of the serialized parameter set.
pub const FLASH_PARAMETER_SET: &str = "Flash_Parameter_Set";

/// NAND cell technology (bits per cell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlashTechnology {
    Slc,
    Mlc,
    Tlc,
}

impl FlashTechnology {
    fn as_attr(self) -> &'static str {
        match self {
            FlashTechnology::Slc => "SLC",
            FlashTechnology::Mlc => "MLC",
            FlashTechnology::Tlc => "TLC",
        }
    }

    fn from_attr(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "SLC" => Some(FlashTechnology::Slc),
            "MLC" => Some(FlashTechnology::Mlc),
            "TLC" => Some(FlashTechnology::Tlc),
            _ => None,
        }
    }
}

/// Which in-progress flash commands may be suspended for a higher-priority
/// read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmdSuspensionMode {
    None,
    Erase,
    Program,
    ProgramErase,
}

impl CmdSuspensionMode {
    fn as_attr(self) -> &'static str {
        match self {
            CmdSuspensionMode::None => "NONE",
            CmdSuspensionMode::Erase => "ERASE",
            CmdSuspensionMode::Program => "PROGRAM",
            CmdSuspensionMode::ProgramErase => "PROGRAM_ERASE",
        }
    }

    fn from_attr(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "NONE" => Some(CmdSuspensionMode::None),
            "ERASE" => Some(CmdSuspensionMode::Erase),
            "PROGRAM" => Some(CmdSuspensionMode::Program),
            "PROGRAM_ERASE" => Some(CmdSuspensionMode::ProgramErase),
            _ => None,
        }
    }
}

/// Where partial GEMV results are accumulated.
///
/// Controller-level crosses the chip-to-controller boundary once per partial
/// (DRAM write each); chip-level sums on the die and only the final scalar
/// is transferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregationMode {
    ControllerLevel,
    ChipLevel,
}

impl AggregationMode {
    fn as_attr(self) -> &'static str {
        match self {
            AggregationMode::ControllerLevel => "0",
            AggregationMode::ChipLevel => "1",
        }
    }

    fn from_attr(value: &str) -> Option<Self> {
        match value {
            "0" => Some(AggregationMode::ControllerLevel),
            "1" => Some(AggregationMode::ChipLevel),
            _ => None,
        }
    }
}

/// Flash subsystem parameters. All latencies are nanoseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashParameters {
    pub flash_technology: FlashTechnology,
    pub cmd_suspension_support: CmdSuspensionMode,
    pub page_read_latency_lsb: SimTimeNs,
    pub page_read_latency_csb: SimTimeNs,
    pub page_read_latency_msb: SimTimeNs,
    pub page_program_latency_lsb: SimTimeNs,
    pub page_program_latency_csb: SimTimeNs,
    pub page_program_latency_msb: SimTimeNs,
    pub block_erase_latency: SimTimeNs,
    pub block_pe_cycles_limit: u32,
    pub suspend_erase_time: SimTimeNs,
    pub suspend_program_time: SimTimeNs,
    pub die_no_per_chip: u32,
    pub plane_no_per_die: u32,
    pub block_no_per_plane: u32,
    pub page_no_per_block: u32,
    /// Flash page capacity in bytes.
    pub page_capacity: u32,
    /// Flash page metadata (spare area) capacity in bytes.
    pub page_metadata_capacity: u32,
    pub ifc_enabled: bool,
    pub ifc_dot_product_latency: SimTimeNs,
    pub ecc_decode_latency: SimTimeNs,
    pub ecc_retry_latency: SimTimeNs,
    pub ecc_max_retries: u32,
    /// Per-block read count above which read-reclaim should be triggered.
    pub read_reclaim_threshold: u32,
    pub ecc_base_rber: f64,
    pub ecc_read_count_factor: f64,
    pub ecc_pe_cycle_factor: f64,
    pub ecc_retention_factor: f64,
    /// Max correctable bit errors per codeword.
    pub ecc_correction_capability: u32,
    /// ECC codeword size in bytes.
    pub ecc_codeword_size: u32,
    pub ifc_aggregation_mode: AggregationMode,
}

impl Default for FlashParameters {
    fn default() -> Self {
        FlashParameters {
            flash_technology: FlashTechnology::Mlc,
            cmd_suspension_support: CmdSuspensionMode::Erase,
            page_read_latency_lsb: 75_000,
            page_read_latency_csb: 75_000,
            page_read_latency_msb: 75_000,
            page_program_latency_lsb: 750_000,
            page_program_latency_csb: 750_000,
            page_program_latency_msb: 750_000,
            block_erase_latency: 3_800_000,
            block_pe_cycles_limit: 10_000,
            suspend_erase_time: 700_000,
            suspend_program_time: 100_000,
            die_no_per_chip: 2,
            plane_no_per_die: 2,
            block_no_per_plane: 2048,
            page_no_per_block: 256,
            page_capacity: 8192,
            page_metadata_capacity: 1872,
            ifc_enabled: false,
            ifc_dot_product_latency: 5_000,
            ecc_decode_latency: 10_000,
            ecc_retry_latency: 50_000,
            ecc_max_retries: 3,
            read_reclaim_threshold: 100_000,
            ecc_base_rber: 1e-9,
            ecc_read_count_factor: 1e-12,
            ecc_pe_cycle_factor: 1e-10,
            ecc_retention_factor: 1e-20,
            ecc_correction_capability: 40,
            ecc_codeword_size: 1024,
            ifc_aggregation_mode: AggregationMode::ControllerLevel,
        }
    }
}

/// Configuration parse failure. Fatal; the message names the offending
/// attribute so misconfigured sweeps are easy to pin down.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed value `{value}` for attribute `{attribute}`")]
    MalformedValue { attribute: &'static str, value: String },
    #[error("unknown value `{value}` for attribute `{attribute}`")]
    UnknownEnum { attribute: &'static str, value: String },
    #[error(transparent)]
    Document(#[from] DocumentError),
}

fn parse_u64(attribute: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.parse().map_err(|_| ConfigError::MalformedValue {
        attribute,
        value: value.to_string(),
    })
}

fn parse_u32(attribute: &'static str, value: &str) -> Result<u32, ConfigError> {
    value.parse().map_err(|_| ConfigError::MalformedValue {
        attribute,
        value: value.to_string(),
    })
}

fn parse_f64(attribute: &'static str, value: &str) -> Result<f64, ConfigError> {
    value.parse().map_err(|_| ConfigError::MalformedValue {
        attribute,
        value: value.to_string(),
    })
}

fn parse_bool(attribute: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_uppercase().as_str() {
        "TRUE" => Ok(true),
        "FALSE" => Ok(false),
        _ => Err(ConfigError::MalformedValue {
            attribute,
            value: value.to_string(),
        }),
    }
}

impl FlashParameters {
    /// Page payload size in bits, the unit the ECC decision rule works in.
    pub fn page_size_in_bits(&self) -> u32 {
        self.page_capacity * 8
    }

    /// Serialize to the attribute document form. Attribute order is fixed so
    /// the output is reproducible.
    pub fn serialize(&self) -> AttributeElement {
        let mut e = AttributeElement::new(FLASH_PARAMETER_SET);
        e.push("Flash_Technology", self.flash_technology.as_attr());
        e.push("CMD_Suspension_Support", self.cmd_suspension_support.as_attr());
        e.push("Page_Read_Latency_LSB", self.page_read_latency_lsb.to_string());
        e.push("Page_Read_Latency_CSB", self.page_read_latency_csb.to_string());
        e.push("Page_Read_Latency_MSB", self.page_read_latency_msb.to_string());
        e.push("Page_Program_Latency_LSB", self.page_program_latency_lsb.to_string());
        e.push("Page_Program_Latency_CSB", self.page_program_latency_csb.to_string());
        e.push("Page_Program_Latency_MSB", self.page_program_latency_msb.to_string());
        e.push("Block_Erase_Latency", self.block_erase_latency.to_string());
        e.push("Block_PE_Cycles_Limit", self.block_pe_cycles_limit.to_string());
        e.push("Suspend_Erase_Time", self.suspend_erase_time.to_string());
        e.push("Suspend_Program_Time", self.suspend_program_time.to_string());
        e.push("Die_No_Per_Chip", self.die_no_per_chip.to_string());
        e.push("Plane_No_Per_Die", self.plane_no_per_die.to_string());
        e.push("Block_No_Per_Plane", self.block_no_per_plane.to_string());
        e.push("Page_No_Per_Block", self.page_no_per_block.to_string());
        e.push("Page_Capacity", self.page_capacity.to_string());
        e.push("Page_Metadata_Capacity", self.page_metadata_capacity.to_string());
        e.push("IFP_Enabled", if self.ifc_enabled { "true" } else { "false" });
        e.push("IFP_Dot_Product_Latency", self.ifc_dot_product_latency.to_string());
        e.push("IFP_ECC_Decode_Latency", self.ecc_decode_latency.to_string());
        e.push("IFP_ECC_Retry_Latency", self.ecc_retry_latency.to_string());
        e.push("IFP_ECC_Max_Retries", self.ecc_max_retries.to_string());
        e.push("Read_Reclaim_Threshold", self.read_reclaim_threshold.to_string());
        e.push("ECC_Base_RBER", self.ecc_base_rber.to_string());
        e.push("ECC_Read_Count_Factor", self.ecc_read_count_factor.to_string());
        e.push("ECC_PE_Cycle_Factor", self.ecc_pe_cycle_factor.to_string());
        e.push("ECC_Retention_Factor", self.ecc_retention_factor.to_string());
        e.push("ECC_Correction_Capability", self.ecc_correction_capability.to_string());
        e.push("ECC_Codeword_Size", self.ecc_codeword_size.to_string());
        e.push("IFP_Aggregation_Mode", self.ifc_aggregation_mode.as_attr());
        e
    }

    /// Deserialize from an attribute element. Missing attributes keep their
    /// defaults; unknown attributes are ignored; malformed values are fatal.
    pub fn deserialize(element: &AttributeElement) -> Result<Self, ConfigError> {
        let mut p = FlashParameters::default();
        for (name, value) in element.attributes() {
            match name {
                "Flash_Technology" => {
                    p.flash_technology = FlashTechnology::from_attr(value).ok_or_else(|| {
                        ConfigError::UnknownEnum {
                            attribute: "Flash_Technology",
                            value: value.to_string(),
                        }
                    })?;
                }
                "CMD_Suspension_Support" => {
                    p.cmd_suspension_support =
                        CmdSuspensionMode::from_attr(value).ok_or_else(|| {
                            ConfigError::UnknownEnum {
                                attribute: "CMD_Suspension_Support",
                                value: value.to_string(),
                            }
                        })?;
                }
                "Page_Read_Latency_LSB" => {
                    p.page_read_latency_lsb = parse_u64("Page_Read_Latency_LSB", value)?;
                }
                "Page_Read_Latency_CSB" => {
                    p.page_read_latency_csb = parse_u64("Page_Read_Latency_CSB", value)?;
                }
                "Page_Read_Latency_MSB" => {
                    p.page_read_latency_msb = parse_u64("Page_Read_Latency_MSB", value)?;
                }
                "Page_Program_Latency_LSB" => {
                    p.page_program_latency_lsb = parse_u64("Page_Program_Latency_LSB", value)?;
                }
                "Page_Program_Latency_CSB" => {
                    p.page_program_latency_csb = parse_u64("Page_Program_Latency_CSB", value)?;
                }
                "Page_Program_Latency_MSB" => {
                    p.page_program_latency_msb = parse_u64("Page_Program_Latency_MSB", value)?;
                }
                "Block_Erase_Latency" => {
                    p.block_erase_latency = parse_u64("Block_Erase_Latency", value)?;
                }
                "Block_PE_Cycles_Limit" => {
                    p.block_pe_cycles_limit = parse_u32("Block_PE_Cycles_Limit", value)?;
                }
                "Suspend_Erase_Time" => {
                    p.suspend_erase_time = parse_u64("Suspend_Erase_Time", value)?;
                }
                "Suspend_Program_Time" => {
                    p.suspend_program_time = parse_u64("Suspend_Program_Time", value)?;
                }
                "Die_No_Per_Chip" => p.die_no_per_chip = parse_u32("Die_No_Per_Chip", value)?,
                "Plane_No_Per_Die" => p.plane_no_per_die = parse_u32("Plane_No_Per_Die", value)?,
                "Block_No_Per_Plane" => {
                    p.block_no_per_plane = parse_u32("Block_No_Per_Plane", value)?;
                }
                "Page_No_Per_Block" => p.page_no_per_block = parse_u32("Page_No_Per_Block", value)?,
                "Page_Capacity" => p.page_capacity = parse_u32("Page_Capacity", value)?,
                "Page_Metadata_Capacity" => {
                    p.page_metadata_capacity = parse_u32("Page_Metadata_Capacity", value)?;
                }
                "IFP_Enabled" => p.ifc_enabled = parse_bool("IFP_Enabled", value)?,
                "IFP_Dot_Product_Latency" => {
                    p.ifc_dot_product_latency = parse_u64("IFP_Dot_Product_Latency", value)?;
                }
                "IFP_ECC_Decode_Latency" => {
                    p.ecc_decode_latency = parse_u64("IFP_ECC_Decode_Latency", value)?;
                }
                "IFP_ECC_Retry_Latency" => {
                    p.ecc_retry_latency = parse_u64("IFP_ECC_Retry_Latency", value)?;
                }
                "IFP_ECC_Max_Retries" => {
                    p.ecc_max_retries = parse_u32("IFP_ECC_Max_Retries", value)?;
                }
                "Read_Reclaim_Threshold" => {
                    p.read_reclaim_threshold = parse_u32("Read_Reclaim_Threshold", value)?;
                }
                "ECC_Base_RBER" => p.ecc_base_rber = parse_f64("ECC_Base_RBER", value)?,
                "ECC_Read_Count_Factor" => {
                    p.ecc_read_count_factor = parse_f64("ECC_Read_Count_Factor", value)?;
                }
                "ECC_PE_Cycle_Factor" => {
                    p.ecc_pe_cycle_factor = parse_f64("ECC_PE_Cycle_Factor", value)?;
                }
                "ECC_Retention_Factor" => {
                    p.ecc_retention_factor = parse_f64("ECC_Retention_Factor", value)?;
                }
                "ECC_Correction_Capability" => {
                    p.ecc_correction_capability = parse_u32("ECC_Correction_Capability", value)?;
                }
                "ECC_Codeword_Size" => p.ecc_codeword_size = parse_u32("ECC_Codeword_Size", value)?,
                "IFP_Aggregation_Mode" => {
                    p.ifc_aggregation_mode =
                        AggregationMode::from_attr(value).ok_or_else(|| {
                            ConfigError::UnknownEnum {
                                attribute: "IFP_Aggregation_Mode",
                                value: value.to_string(),
                            }
                        })?;
                }
                // Unknown attributes belong to other parameter sets; skip.
                _ => {}
            }
        }
        Ok(p)
    }

    /// Parse from the rendered document text.
    pub fn from_document(text: &str) -> Result<Self, ConfigError> {
        let element = AttributeElement::parse(text)?;
        Self::deserialize(&element)
    }
}
