//! Input validation shared by request DTOs
//!
//! Brazilian document checksums (CPF/CNPJ), address and phone formats, and a
//! field-keyed error collector that renders as HTTP 422.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::ApiError;

pub const UFS: [&str; 27] = [
    "AC", "AL", "AP", "AM", "BA", "CE", "DF", "ES", "GO", "MA", "MT", "MS", "MG", "PA", "PB",
    "PR", "PE", "PI", "RJ", "RN", "RS", "RO", "RR", "SC", "SP", "SE", "TO",
];

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MIN_AGE: i32 = 18;

/// Strip everything but ASCII digits (formatting dots, dashes, slashes, spaces)
pub fn only_digits(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn digits_of(s: &str) -> Vec<u32> {
    s.chars().filter_map(|c| c.to_digit(10)).collect()
}

fn all_same(digits: &[u32]) -> bool {
    digits.windows(2).all(|w| w[0] == w[1])
}

pub fn is_valid_cpf(input: &str) -> bool {
    if input.chars().any(|c| !(c.is_ascii_digit() || c == '.' || c == '-' || c == ' ')) {
        return false;
    }
    let d = digits_of(input);
    if d.len() != 11 || all_same(&d) {
        return false;
    }

    let check = |len: usize| -> u32 {
        let sum: u32 = d[..len]
            .iter()
            .enumerate()
            .map(|(i, v)| v * (len as u32 + 1 - i as u32))
            .sum();
        (sum * 10) % 11 % 10
    };

    check(9) == d[9] && check(10) == d[10]
}

pub fn is_valid_cnpj(input: &str) -> bool {
    if input
        .chars()
        .any(|c| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '/' | ' ')))
    {
        return false;
    }
    let d = digits_of(input);
    if d.len() != 14 || all_same(&d) {
        return false;
    }

    const W1: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
    const W2: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

    let check = |weights: &[u32]| -> u32 {
        let sum: u32 = d.iter().zip(weights).map(|(v, w)| v * w).sum();
        match sum % 11 {
            r if r < 2 => 0,
            r => 11 - r,
        }
    };

    check(&W1) == d[12] && check(&W2) == d[13]
}

pub fn is_valid_cep(input: &str) -> bool {
    input.chars().all(|c| c.is_ascii_digit() || c == '-') && only_digits(input).len() == 8
}

/// DDD plus an 8 or 9 digit number
pub fn is_valid_telefone(input: &str) -> bool {
    let allowed = |c: char| c.is_ascii_digit() || matches!(c, '(' | ')' | '-' | ' ' | '+');
    if !input.chars().all(allowed) {
        return false;
    }
    let digits = only_digits(input);
    matches!(digits.len(), 10 | 11) && !digits.starts_with('0')
}

pub fn is_valid_uf(input: &str) -> bool {
    UFS.contains(&input.to_uppercase().as_str())
}

pub fn is_valid_email(input: &str) -> bool {
    let Some((local, domain)) = input.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !input.chars().any(char::is_whitespace)
        && input.len() <= 254
}

/// Completed years between `birth` and `today`
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut years = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }
    years
}

/// Field-keyed validation messages, rendered as `{"errors": {field: [..]}}`
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single-field error, for checks that happen after DTO validation
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.add(field, message);
        }
    }

    pub fn required(&mut self, field: &str, value: &str) -> bool {
        let present = !value.trim().is_empty();
        if !present {
            self.add(field, format!("O campo {} é obrigatório.", field));
        }
        present
    }

    pub fn max_len(&mut self, field: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.add(
                field,
                format!("O campo {} não pode ter mais de {} caracteres.", field, max),
            );
        }
    }

    pub fn email(&mut self, field: &str, value: &str) {
        if self.required(field, value) {
            self.check(is_valid_email(value), field, "Informe um e-mail válido.");
            self.max_len(field, value, 254);
        }
    }

    pub fn password(&mut self, field: &str, password: &str, confirmation: &str) {
        if password.chars().count() < MIN_PASSWORD_LEN {
            self.add(
                field,
                format!("A senha deve ter pelo menos {} caracteres.", MIN_PASSWORD_LEN),
            );
        }
        self.check(
            password == confirmation,
            field,
            "A confirmação de senha não confere.",
        );
    }

    pub fn cpf(&mut self, field: &str, value: &str) {
        if self.required(field, value) {
            self.check(is_valid_cpf(value), field, "O CPF informado é inválido.");
        }
    }

    pub fn cnpj(&mut self, field: &str, value: &str) {
        if self.required(field, value) {
            self.check(is_valid_cnpj(value), field, "O CNPJ informado é inválido.");
        }
    }

    pub fn telefone(&mut self, field: &str, value: &str) {
        if self.required(field, value) {
            self.check(
                is_valid_telefone(value),
                field,
                "Informe um telefone com DDD válido.",
            );
        }
    }

    pub fn cep(&mut self, field: &str, value: &str) {
        if self.required(field, value) {
            self.check(is_valid_cep(value), field, "O CEP deve ter 8 dígitos.");
        }
    }

    pub fn uf(&mut self, field: &str, value: &str) {
        if self.required(field, value) {
            self.check(is_valid_uf(value), field, "Informe uma UF válida.");
        }
    }

    /// Merge errors of a nested object under `prefix.`
    pub fn nested(&mut self, prefix: &str, other: ValidationErrors) {
        for (field, messages) in other.0 {
            for message in messages {
                self.add(&format!("{}.{}", prefix, field), message);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `Ok(())` when nothing was recorded, a 422 otherwise
    pub fn finish(self) -> Result<(), ApiError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self))
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields: Vec<&str> = self.fields().collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}
