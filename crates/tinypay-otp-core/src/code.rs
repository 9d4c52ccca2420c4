//! Payment-code formats.
//!
//! Two textual forms carry an OTP to a counterparty:
//!
//! - the pay code rendered as a QR on phone and watch:
//!   `addr:<payerAddress> otp:0x<digest>`
//! - scan URIs exchanged between wallets:
//!   `tinypay://pay?address=<a>&otp=<o>` and
//!   `tinypay://receive?address=<a>&amount=<n>`

use std::fmt;
use std::str::FromStr;

use url::{form_urlencoded, Url};

use crate::digest::Digest;
use crate::error::CoreError;

/// URI scheme used by scan codes.
pub const SCAN_SCHEME: &str = "tinypay";

/// The `addr:<address> otp:0x<digest>` pay code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentCode {
    pub payer_address: String,
    pub digest: Digest,
}

impl fmt::Display for PaymentCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "addr:{} otp:0x{}", self.payer_address, self.digest.to_hex())
    }
}

impl FromStr for PaymentCode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |why: &str| CoreError::InvalidPaymentCode(why.to_string());

        let rest = s.trim().strip_prefix("addr:").ok_or_else(|| invalid("missing addr: prefix"))?;
        let (address, otp) = rest
            .split_once(" otp:")
            .ok_or_else(|| invalid("missing otp: field"))?;
        if address.is_empty() {
            return Err(invalid("empty address"));
        }
        let hex = otp
            .strip_prefix("0x")
            .or_else(|| otp.strip_prefix("0X"))
            .ok_or_else(|| invalid("otp must be 0x-prefixed"))?;

        Ok(Self {
            payer_address: address.to_string(),
            digest: Digest::from_hex(hex)?,
        })
    }
}

/// A wallet-to-wallet scan URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanUri {
    /// Payer presents address and OTP.
    Pay { address: String, otp: String },
    /// Payee requests an amount.
    Receive { address: String, amount: String },
}

impl ScanUri {
    /// Pay URI carrying a full chain digest.
    pub fn pay(address: impl Into<String>, otp: &Digest) -> Self {
        Self::Pay {
            address: address.into(),
            otp: otp.to_hex(),
        }
    }

    /// The address field, present on both variants.
    pub fn address(&self) -> &str {
        match self {
            Self::Pay { address, .. } | Self::Receive { address, .. } => address,
        }
    }

    /// Render as a `tinypay://` URI string.
    pub fn to_uri_string(&self) -> String {
        let (host, pairs): (&str, [(&str, &str); 2]) = match self {
            Self::Pay { address, otp } => {
                ("pay", [("address", address.as_str()), ("otp", otp.as_str())])
            }
            Self::Receive { address, amount } => {
                let amount = if amount.is_empty() { "0" } else { amount.as_str() };
                ("receive", [("address", address.as_str()), ("amount", amount)])
            }
        };

        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        format!("{SCAN_SCHEME}://{host}?{query}")
    }
}

impl fmt::Display for ScanUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uri_string())
    }
}

impl FromStr for ScanUri {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(s.trim()).map_err(|e| CoreError::InvalidPaymentCode(e.to_string()))?;
        if url.scheme() != SCAN_SCHEME {
            return Err(CoreError::InvalidPaymentCode(format!(
                "unexpected scheme {:?}",
                url.scheme()
            )));
        }

        let mut address = None;
        let mut otp = None;
        let mut amount = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "address" => address = Some(value.into_owned()),
                "otp" => otp = Some(value.into_owned()),
                "amount" => amount = Some(value.into_owned()),
                _ => {}
            }
        }

        let address = address
            .filter(|a| !a.is_empty())
            .ok_or_else(|| CoreError::InvalidPaymentCode("missing address".into()))?;

        match url.host_str() {
            Some("pay") => Ok(Self::Pay {
                address,
                otp: otp.unwrap_or_default(),
            }),
            Some("receive") => Ok(Self::Receive {
                address,
                amount: amount.unwrap_or_else(|| "0".to_string()),
            }),
            other => Err(CoreError::InvalidPaymentCode(format!(
                "unknown scan type {:?}",
                other.unwrap_or("")
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_code_format() {
        let code = PaymentCode {
            payer_address: "0xabc".into(),
            digest: Digest::from_bytes([0x11; 32]),
        };
        assert_eq!(code.to_string(), format!("addr:0xabc otp:0x{}", "11".repeat(32)));
    }

    #[test]
    fn test_payment_code_parse() {
        let text = format!("addr:0xabc otp:0x{}", "ef".repeat(32));
        let code: PaymentCode = text.parse().unwrap();
        assert_eq!(code.payer_address, "0xabc");
        assert_eq!(code.digest, Digest::from_bytes([0xef; 32]));
        assert_eq!(code.to_string(), text);
    }

    #[test]
    fn test_payment_code_rejects_garbage() {
        assert!("hello".parse::<PaymentCode>().is_err());
        assert!("addr: otp:0x00".parse::<PaymentCode>().is_err());
        assert!(format!("addr:0xabc otp:{}", "ef".repeat(32))
            .parse::<PaymentCode>()
            .is_err());
    }

    #[test]
    fn test_pay_uri() {
        let uri = ScanUri::Pay {
            address: "0xabc".into(),
            otp: "deadbeef".into(),
        };
        assert_eq!(uri.to_uri_string(), "tinypay://pay?address=0xabc&otp=deadbeef");
        assert_eq!(uri.to_uri_string().parse::<ScanUri>().unwrap(), uri);
    }

    #[test]
    fn test_receive_uri_defaults_amount() {
        let uri = ScanUri::Receive {
            address: "0xabc".into(),
            amount: String::new(),
        };
        assert_eq!(uri.to_uri_string(), "tinypay://receive?address=0xabc&amount=0");

        let parsed: ScanUri = "tinypay://receive?address=0xabc".parse().unwrap();
        assert_eq!(
            parsed,
            ScanUri::Receive {
                address: "0xabc".into(),
                amount: "0".into()
            }
        );
    }

    #[test]
    fn test_scan_uri_rejects_foreign() {
        assert!("https://pay?address=0xabc".parse::<ScanUri>().is_err());
        assert!("tinypay://refund?address=0xabc".parse::<ScanUri>().is_err());
        assert!("tinypay://pay?otp=00".parse::<ScanUri>().is_err());
    }

    #[test]
    fn test_pay_uri_from_digest() {
        let digest = Digest::from_bytes([0x0a; 32]);
        let uri = ScanUri::pay("0xabc", &digest);
        assert_eq!(uri.address(), "0xabc");
        assert!(uri.to_string().ends_with(&"0a".repeat(32)));
    }
}
