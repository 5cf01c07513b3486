//! Contact details and the masking applied before two parties have agreed
//! to work together.

use serde::{Deserialize, Serialize};

use crate::validation::only_digits;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Contato {
    pub email: String,
    pub telefone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpf: Option<String>,
    /// `false` when the fields above are masked
    pub liberado: bool,
}

impl Contato {
    pub fn new(email: &str, telefone: &str, cpf: Option<&str>, liberado: bool) -> Self {
        if liberado {
            Self {
                email: email.to_string(),
                telefone: telefone.to_string(),
                cpf: cpf.map(str::to_string),
                liberado,
            }
        } else {
            Self {
                email: mask_email(email),
                telefone: mask_telefone(telefone),
                cpf: cpf.map(mask_cpf),
                liberado,
            }
        }
    }
}

/// `maria@escola.com` -> `ma***@escola.com`
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let keep = if local.chars().count() > 2 { 2 } else { 1 };
            let visible: String = local.chars().take(keep).collect();
            format!("{}***@{}", visible, domain)
        }
        None => "***".to_string(),
    }
}

/// `11987654321` -> `(11) *****-4321`
pub fn mask_telefone(telefone: &str) -> String {
    let digits = only_digits(telefone);
    if digits.len() < 10 {
        return "*".repeat(digits.len().max(4));
    }
    let (ddd, rest) = digits.split_at(2);
    let (hidden, tail) = rest.split_at(rest.len() - 4);
    format!("({}) {}-{}", ddd, "*".repeat(hidden.len()), tail)
}

/// `52998224725` -> `***.***.***-25`
pub fn mask_cpf(cpf: &str) -> String {
    let digits = only_digits(cpf);
    let tail = if digits.len() >= 2 {
        &digits[digits.len() - 2..]
    } else {
        "**"
    };
    format!("***.***.***-{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_email_local_part() {
        assert_eq!(mask_email("maria@x.com"), "ma***@x.com");
        assert_eq!(mask_email("jo@x.com"), "j***@x.com");
        assert_eq!(mask_email("broken"), "***");
    }

    #[test]
    fn masks_phone_keeping_ddd_and_last_digits() {
        assert_eq!(mask_telefone("11987654321"), "(11) *****-4321");
        assert_eq!(mask_telefone("(41) 3333-4444"), "(41) ****-4444");
        assert_eq!(mask_telefone("123"), "****");
    }

    #[test]
    fn masks_cpf_keeping_check_digits() {
        assert_eq!(mask_cpf("52998224725"), "***.***.***-25");
    }

    #[test]
    fn released_contact_is_untouched() {
        let open = Contato::new("maria@x.com", "11987654321", Some("52998224725"), true);
        assert_eq!(open.email, "maria@x.com");
        assert_eq!(open.cpf.as_deref(), Some("52998224725"));

        let masked = Contato::new("maria@x.com", "11987654321", None, false);
        assert_eq!(masked.email, "ma***@x.com");
        assert_eq!(masked.telefone, "(11) *****-4321");
        assert!(!masked.liberado);
        assert_eq!(masked.cpf, None);
    }
}
