//! Domain types and DTOs
//!
//! Entities, request/response shapes and the pure rules attached to them
//! (status transitions, contact masking, field validation).

/// Declares a closed set of values stored as TEXT and exchanged as strings.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("valor inválido para {}: {}", stringify!($name), other)),
                }
            }
        }
    };
}

pub mod auth;
pub mod candidatos;
pub mod contato;
pub mod dashboard;
pub mod deficiencias;
pub mod enderecos;
pub mod external;
pub mod instituicoes;
pub mod notificacoes;
pub mod propostas;
pub mod vagas;

/// Parse a TEXT column into one of the enums above, failing loudly on drift
pub fn parse_column<T>(value: &str) -> Result<T, crate::error::ApiError>
where
    T: std::str::FromStr<Err = String>,
{
    value
        .parse()
        .map_err(|e: String| crate::error::ApiError::internal(format!("corrupt column: {}", e)))
}
