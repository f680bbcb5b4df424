use crate::library::helpers::non_blank;
use serde::{Deserialize, Serialize};

/// Field type carrying a single scalar reference
///
/// Event schemas wrap most references in dedicated types. Instead of inspecting
/// them at runtime, each wrapper exposes its value through this trait.
pub trait ScalarValue {
    /// Trimmed value or `None` if it is blank
    fn value(&self) -> Option<&str>;
}

/// Reads the value of an optional scalar field
pub fn value_of<T: ScalarValue>(field: &Option<T>) -> Option<&str> {
    field.as_ref().and_then(ScalarValue::value)
}

macro_rules! scalar_values {
    ($($(#[$meta:meta])* $name:ident;)+) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(pub String);

            impl ScalarValue for $name {
                fn value(&self) -> Option<&str> {
                    non_blank(&self.0)
                }
            }

            impl From<&str> for $name {
                fn from(value: &str) -> Self {
                    Self(value.to_owned())
                }
            }
        )+
    };
}

scalar_values! {
    /// Reference to a line
    LineRef;
    /// Reference to a single boarding point (quay)
    StopPointRef;
    /// Reference to a stop place containing one or more stop points
    StopPlaceRef;
    /// Reference to an operator
    OperatorRef;
    /// Codespace of the data source that produced a journey
    DataSource;
    /// Codespace of the participant that published a situation
    ParticipantRef;
    /// Reference to a dated vehicle journey
    DatedVehicleJourneyRef;
    /// Identifier of a situation
    SituationNumber;
    /// Reference to a connection link between two stop points
    ConnectionLinkRef;
    /// Reference to a route section
    SectionRef;
    /// Reference to the link of a link projection
    LinkRef;
}

#[cfg(test)]
mod does {
    use super::*;

    #[test]
    fn read_trimmed_values() {
        assert_eq!(LineRef::from(" NSB:Line:L1 ").value(), Some("NSB:Line:L1"));
    }

    #[test]
    fn treat_blank_values_as_absent() {
        assert_eq!(value_of(&Some(StopPointRef::from("  "))), None);
        assert_eq!(value_of::<StopPointRef>(&None), None);
    }

    #[test]
    fn serialize_transparently() {
        let json = serde_json::to_string(&StopPlaceRef::from("NSR:StopPlace:1")).unwrap();
        assert_eq!(json, r#""NSR:StopPlace:1""#);
    }
}
