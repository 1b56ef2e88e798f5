/// Lazily compiled, process-wide regex for a constant pattern.
#[macro_export]
macro_rules! regex {
    ($pat:expr) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).unwrap());
        &*RE
    }};
}

/// Arity signature for a built-in function or modifier.
///
/// The pattern is a regular expression over the `S` alphabet (one `S` per
/// supplied argument), anchored on both ends.
macro_rules! signature {
    ($pat:literal) => {
        $crate::engine::Signature::from_regex($pat, $crate::regex!(concat!("^(?:", $pat, ")$")).clone())
    };
}

/// Declares the closed set of mapping slots.
///
/// Each entry expands to a field on `Mapping`, a `Slot` variant, and the
/// name/kind tables used by filters, placeholders and the editor.
macro_rules! mapping_slots {
    ( $( $variant:ident => $field:ident : $kind:ident ($ty:ty) ),* $(,)? ) => {
        /// A mapping record: subject, predicate and object plus provenance metadata.
        #[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
        #[serde(default)]
        pub struct Mapping {
            $(
                #[serde(skip_serializing_if = "crate::mapping::is_unset")]
                pub $field: $ty,
            )*
            /// Non-standard slots, keyed by their (usually expanded) property name.
            #[serde(skip_serializing_if = "std::collections::BTreeMap::is_empty")]
            pub extensions: std::collections::BTreeMap<String, String>,
        }

        /// Every standard slot of a [`Mapping`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Slot {
            $( $variant, )*
        }

        impl Slot {
            /// All slots in canonical order.
            pub const ALL: &'static [Slot] = &[ $( Slot::$variant, )* ];

            pub fn name(self) -> &'static str {
                match self {
                    $( Slot::$variant => stringify!($field), )*
                }
            }

            pub fn kind(self) -> SlotKind {
                match self {
                    $( Slot::$variant => SlotKind::$kind, )*
                }
            }

            pub fn from_name(name: &str) -> Option<Slot> {
                match name {
                    $( stringify!($field) => Some(Slot::$variant), )*
                    _ => None,
                }
            }
        }

        impl Mapping {
            /// Read a slot as a dynamically typed value.
            pub fn get(&self, slot: Slot) -> SlotValue {
                match slot {
                    $( Slot::$variant => SlotField::to_value(&self.$field), )*
                }
            }

            /// Write a slot; the value shape must fit the slot kind.
            pub fn set(&mut self, slot: Slot, value: SlotValue) -> Result<(), MappingError> {
                match slot {
                    $(
                        Slot::$variant => {
                            self.$field = SlotField::from_value(value).ok_or(MappingError::SlotMismatch(slot.name()))?;
                        }
                    )*
                }
                Ok(())
            }
        }
    };
}
