//! String tag conversions for domain enums
//!
//! Catalog documents, the sync state table and budget names all carry these
//! enums as fixed string tags.
//!
//! ```rust
//! use costsync_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Tier {
//!     Gold,
//!     Silver,
//! }
//!
//! impl_domain_status_conversions!(Tier {
//!     Gold => "gold",
//!     Silver => "silver",
//! });
//!
//! assert_eq!(Tier::Gold.as_str(), "gold");
//! assert_eq!("SILVER".parse::<Tier>(), Ok(Tier::Silver));
//! ```

/// Generates `as_str`, `Display` and a case-insensitive `FromStr` from a
/// variant-to-tag table.
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:literal),+ $(,)? }) => {
        impl $enum_name {
            /// The tag this variant is stored and displayed as.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
