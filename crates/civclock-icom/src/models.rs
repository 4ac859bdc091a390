//! Icom model definitions.
//!
//! Each supported rig is described by an [`IcomModel`]: its default CI-V
//! address and the three menu-item opcodes that set the clock, the date
//! and the UTC offset. The opcodes are all `1A 05 <item>` "set menu item"
//! commands; the item number differs per model.
//!
//! | Model    | CI-V | Date     | Time     | UTC offset |
//! |----------|------|----------|----------|------------|
//! | IC-705   | `A4` | 1A050165 | 1A050166 | 1A050170   |
//! | IC-7100  | `88` | 1A050120 | 1A050121 | 1A050123   |
//! | IC-7300  | `94` | 1A050094 | 1A050095 | 1A050096   |
//! | IC-7600  | `7A` | 1A050053 | 1A050054 | 1A050056   |
//! | IC-7610  | `98` | 1A050158 | 1A050159 | 1A050162   |
//! | IC-7700  | `74` | 1A050058 | 1A050059 | 1A050061   |
//! | IC-7850  | `8E` | 1A050095 | 1A050096 | 1A050099   |
//! | IC-7851  | `8E` | 1A050095 | 1A050096 | 1A050099   |
//! | IC-9700  | `A2` | 1A050179 | 1A050180 | 1A050184   |
//! | IC-R8600 | `96` | 1A050131 | 1A050132 | 1A050135   |
//! | IC-R9500 | `72` | 1A050048 | 1A050049 | 1A050051   |

use civclock_core::{Error, Result};

/// Static definition of an Icom transceiver's clock commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IcomModel {
    /// Model name (e.g. "IC-7300").
    pub name: &'static str,
    /// Factory-default CI-V address, two hex digits.
    pub default_civ_address: &'static str,
    /// Opcode for `setDateCommand`.
    pub set_date: &'static str,
    /// Opcode for `setTimeCommand`.
    pub set_time: &'static str,
    /// Opcode for `setUtcOffsetCommand`.
    pub set_utc_offset: &'static str,
}

impl IcomModel {
    /// Opcode for the given command name, if this model has it.
    pub fn opcode(&self, command: &str) -> Option<&'static str> {
        match command {
            "setDateCommand" => Some(self.set_date),
            "setTimeCommand" => Some(self.set_time),
            "setUtcOffsetCommand" => Some(self.set_utc_offset),
            _ => None,
        }
    }

}

const fn model(
    name: &'static str,
    default_civ_address: &'static str,
    set_date: &'static str,
    set_time: &'static str,
    set_utc_offset: &'static str,
) -> IcomModel {
    IcomModel {
        name,
        default_civ_address,
        set_date,
        set_time,
        set_utc_offset,
    }
}

/// Every supported model, in display order.
pub const MODELS: &[IcomModel] = &[
    model("IC-705", "A4", "1A050165", "1A050166", "1A050170"),
    model("IC-7100", "88", "1A050120", "1A050121", "1A050123"),
    model("IC-7300", "94", "1A050094", "1A050095", "1A050096"),
    model("IC-7600", "7A", "1A050053", "1A050054", "1A050056"),
    model("IC-7610", "98", "1A050158", "1A050159", "1A050162"),
    model("IC-7700", "74", "1A050058", "1A050059", "1A050061"),
    model("IC-7850", "8E", "1A050095", "1A050096", "1A050099"),
    model("IC-7851", "8E", "1A050095", "1A050096", "1A050099"),
    model("IC-9700", "A2", "1A050179", "1A050180", "1A050184"),
    model("IC-R8600", "96", "1A050131", "1A050132", "1A050135"),
    model("IC-R9500", "72", "1A050048", "1A050049", "1A050051"),
];

/// Rig-type strings (as rig-control software names its rig definitions)
/// mapped to the model whose clock commands they use.
const RIG_TYPES: &[(&str, &str)] = &[
    ("IC-705", "IC-705"),
    ("IC-705-DATA", "IC-705"),
    ("IC-7100", "IC-7100"),
    ("IC-7100-DATA-FIL1", "IC-7100"),
    ("IC-7100e4", "IC-7100"),
    ("IC-7100e4-DATA", "IC-7100"),
    ("IC-7300", "IC-7300"),
    ("IC-7300-DATA", "IC-7300"),
    ("IC-7600", "IC-7600"),
    ("IC-7600v2", "IC-7600"),
    ("IC-7600v2-DATA", "IC-7600"),
    ("IC-7610", "IC-7610"),
    ("IC-7610-DATA", "IC-7610"),
    ("IC-7610-DATA-FIL1", "IC-7610"),
    ("IC-7700", "IC-7700"),
    ("IC-7700v2", "IC-7700"),
    ("IC-7700v2-DATA", "IC-7700"),
    ("IC-7850", "IC-7850"),
    ("IC-7850-DATA", "IC-7850"),
    ("IC-7850-DATA-FIL1", "IC-7850"),
    ("IC-7851", "IC-7851"),
    ("IC-7851-DATA", "IC-7851"),
    ("IC-7851-DATA-FIL1", "IC-7851"),
    ("IC-9700", "IC-9700"),
    ("IC-9700-DATA", "IC-9700"),
    ("IC-9700-SAT", "IC-9700"),
    ("IC-R8600", "IC-R8600"),
    ("IC-R9500", "IC-R9500"),
];

/// Look up a model by exact name.
pub fn find_model(name: &str) -> Option<&'static IcomModel> {
    MODELS.iter().find(|m| m.name == name)
}

/// Look up a model by name, failing with a configuration error.
pub fn lookup_model(name: &str) -> Result<&'static IcomModel> {
    find_model(name).ok_or_else(|| {
        Error::Configuration(format!(
            "unknown transceiver model '{name}' (valid models: {})",
            model_names().join(", ")
        ))
    })
}

/// Opcode hex for `command` on `model`.
pub fn lookup_opcode(model: &str, command: &str) -> Result<&'static str> {
    lookup_model(model)?.opcode(command).ok_or_else(|| {
        Error::Configuration(format!("command '{command}' not found for transceiver {model}"))
    })
}

/// Default CI-V address hex for `model`.
pub fn lookup_transceiver_address(model: &str) -> Result<&'static str> {
    lookup_model(model)
        .map(|m| m.default_civ_address)
        .map_err(|_| Error::Configuration(format!("transceiver address not found for {model}")))
}

/// Map a rig-type string to a model name.
///
/// Tries an exact match first, then any known rig type followed by `-`
/// (so `IC-7300-DATA-FIL2` resolves through `IC-7300`).
pub fn lookup_model_for_rig_type(rig_type: &str) -> Result<&'static str> {
    if let Some((_, model)) = RIG_TYPES.iter().find(|(t, _)| *t == rig_type) {
        return Ok(model);
    }
    RIG_TYPES
        .iter()
        .find(|(t, _)| {
            rig_type
                .strip_prefix(t)
                .is_some_and(|rest| rest.starts_with('-'))
        })
        .map(|(_, model)| *model)
        .ok_or_else(|| Error::Configuration(format!("rig type '{rig_type}' not found")))
}

/// Names of all supported models.
pub fn model_names() -> Vec<&'static str> {
    MODELS.iter().map(|m| m.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::civ::{hex_to_bytes, is_hex_byte};
    use civclock_core::Operation;

    #[test]
    fn all_models_have_well_formed_entries() {
        for m in MODELS {
            assert!(is_hex_byte(m.default_civ_address), "{}", m.name);
            for op in Operation::ALL {
                let opcode = lookup_opcode(m.name, op.command_name()).unwrap();
                assert_eq!(hex_to_bytes(opcode).unwrap().len(), 4, "{} {op}", m.name);
                assert!(opcode.starts_with("1A05"), "{} {op}", m.name);
            }
        }
    }

    #[test]
    fn model_names_are_unique() {
        let mut names = model_names();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), MODELS.len());
    }

    #[test]
    fn every_rig_type_maps_to_a_model() {
        for (rig_type, model) in RIG_TYPES {
            assert!(find_model(model).is_some(), "{rig_type} -> {model}");
        }
    }

    #[test]
    fn ic7300_opcodes() {
        assert_eq!(lookup_opcode("IC-7300", "setDateCommand").unwrap(), "1A050094");
        assert_eq!(lookup_opcode("IC-7300", "setTimeCommand").unwrap(), "1A050095");
        assert_eq!(lookup_opcode("IC-7300", "setUtcOffsetCommand").unwrap(), "1A050096");
        assert_eq!(lookup_transceiver_address("IC-7300").unwrap(), "94");
    }

    #[test]
    fn opcode_names_match_table_columns() {
        let m = lookup_model("IC-9700").unwrap();
        assert_eq!(m.opcode(Operation::SetDate.command_name()), Some(m.set_date));
        assert_eq!(m.opcode(Operation::SetTime.command_name()), Some(m.set_time));
        assert_eq!(
            m.opcode(Operation::SetUtcOffset.command_name()),
            Some(m.set_utc_offset)
        );
    }

    #[test]
    fn unknown_model_is_configuration_error() {
        assert!(matches!(lookup_model("IC-999"), Err(Error::Configuration(_))));
        assert!(matches!(
            lookup_transceiver_address("IC-999"),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn unknown_command_is_configuration_error() {
        let err = lookup_opcode("IC-7300", "setFrequencyCommand").unwrap_err();
        assert!(err.to_string().contains("setFrequencyCommand"));
    }

    #[test]
    fn rig_type_exact_match() {
        assert_eq!(lookup_model_for_rig_type("IC-7100e4-DATA").unwrap(), "IC-7100");
        assert_eq!(lookup_model_for_rig_type("IC-9700-SAT").unwrap(), "IC-9700");
    }

    #[test]
    fn rig_type_prefix_match() {
        assert_eq!(lookup_model_for_rig_type("IC-7300-DATA-FIL2").unwrap(), "IC-7300");
        assert_eq!(lookup_model_for_rig_type("IC-R8600-WIDE").unwrap(), "IC-R8600");
    }

    #[test]
    fn rig_type_prefix_needs_separator() {
        // "IC-7300X" is not an IC-7300 variant.
        assert!(lookup_model_for_rig_type("IC-7300X").is_err());
        assert!(lookup_model_for_rig_type("FT-991").is_err());
    }
}
