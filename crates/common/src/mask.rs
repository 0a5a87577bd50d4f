use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use thiserror::Error;

static MOBILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{3})[0-9]{4}([0-9]{4})$").expect("mobile mask pattern"));
static ID_CARD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{6})[0-9]+([0-9]{4})$").expect("id card mask pattern"));

/// Kind of sensitive value to mask.
/// 需遮蔽的敏感資料類型。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaskKind {
    /// 11-digit mobile number: `138****5678`.
    Mobile,
    /// Digit-only identity number: first 6 and last 4 digits stay visible.
    IdCard,
}

impl fmt::Display for MaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaskKind::Mobile => f.write_str("mobile"),
            MaskKind::IdCard => f.write_str("idcard"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MaskError {
    #[error("unknown mask kind '{0}' (expected 'mobile' or 'idcard')")]
    UnknownKind(String),
}

impl FromStr for MaskKind {
    type Err = MaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mobile" | "phone" => Ok(MaskKind::Mobile),
            "idcard" | "id-card" | "id_card" => Ok(MaskKind::IdCard),
            other => Err(MaskError::UnknownKind(other.to_string())),
        }
    }
}

/// Masks the middle of a sensitive value. Input that does not have the
/// expected shape is returned unchanged.
/// 遮蔽敏感字串中段；格式不符時原樣回傳。
pub fn desensitize(value: &str, kind: MaskKind) -> String {
    match kind {
        MaskKind::Mobile => MOBILE.replace(value, "$1****$2").into_owned(),
        MaskKind::IdCard => ID_CARD
            .replace(value, |caps: &Captures<'_>| {
                let hidden = value.len() - caps[1].len() - caps[2].len();
                format!("{}{}{}", &caps[1], "*".repeat(hidden), &caps[2])
            })
            .into_owned(),
    }
}
