//! Signed access links.
//!
//! A link carries the organization, an expiry (unix seconds) and a signature:
//! the lowercase hex HMAC-SHA256 of `organization|expiry` under a shared secret.
//! Requests without any of the three parameters are let through with the
//! default organization.

use hmac::{Hmac, Mac};
use log::{debug, warn};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Separator between the organization and the expiry in the signed message.
/// It is not escaped inside organization names.
pub const LINK_DELIMITER: char = '|';

/// The raw parameters of a request, as received. Empty strings count as absent.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct LinkParams {
    pub organization: Option<String>,
    pub expiry: Option<String>,
    pub signature: Option<String>,
}

impl LinkParams {
    fn present(x: &Option<String>) -> Option<&str> {
        x.as_deref().filter(|s| !s.is_empty())
    }
}

/// A link issued for one organization.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct LinkGrant {
    pub organization: String,
    pub expiry: u64,
    pub signature: String,
}

impl LinkGrant {
    pub fn params(&self) -> LinkParams {
        LinkParams {
            organization: Some(self.organization.clone()),
            expiry: Some(self.expiry.to_string()),
            signature: Some(self.signature.clone()),
        }
    }
}

/// Outcome of checking a link.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum LinkStatus {
    /// Access is granted for this organization.
    Valid(String),
    Expired,
    InvalidSignature,
    /// Some parameters were provided, but not all of them.
    MissingParams,
}

impl LinkStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, LinkStatus::Valid(_))
    }
}

fn link_message(organization: &str, expiry: &str) -> String {
    format!("{}{}{}", organization, LINK_DELIMITER, expiry)
}

fn new_mac(secret: &[u8], organization: &str, expiry: &str) -> Option<HmacSha256> {
    // HMAC accepts keys of any length, this only fails on broken digest setups.
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(link_message(organization, expiry).as_bytes());
    Some(mac)
}

/// Issues a link for an organization, valid until `expiry` (unix seconds).
pub fn sign_link(organization: &str, expiry: u64, secret: &[u8]) -> Option<LinkGrant> {
    let mac = new_mac(secret, organization, expiry.to_string().as_str())?;
    Some(LinkGrant {
        organization: organization.to_string(),
        expiry,
        signature: hex::encode(mac.finalize().into_bytes()),
    })
}

/// Checks the parameters of a request against the shared secret.
///
/// Arguments:
/// * `params` the parameters found in the request
/// * `secret` the signing key
/// * `default_organization` the organization granted when no parameter is present
/// * `now` the current time, in unix seconds
pub fn validate_link(
    params: &LinkParams,
    secret: &[u8],
    default_organization: &str,
    now: u64,
) -> LinkStatus {
    let org = LinkParams::present(&params.organization);
    let exp = LinkParams::present(&params.expiry);
    let sig = LinkParams::present(&params.signature);

    let (organization, expiry_s, signature) = match (org, exp, sig) {
        (None, None, None) => {
            debug!(
                "validate_link: no parameters, open access for {:?}",
                default_organization
            );
            return LinkStatus::Valid(default_organization.to_string());
        }
        (Some(o), Some(e), Some(s)) => (o, e, s),
        _ => {
            warn!("validate_link: incomplete parameters {:?}", params);
            return LinkStatus::MissingParams;
        }
    };

    // The issuer only signs decimal timestamps.
    let expiry: u64 = match expiry_s.parse::<u64>() {
        Ok(x) => x,
        Err(_) => {
            warn!("validate_link: unreadable expiry {:?}", expiry_s);
            return LinkStatus::InvalidSignature;
        }
    };

    let provided: Vec<u8> = match hex::decode(signature) {
        Ok(x) => x,
        Err(_) => {
            warn!("validate_link: signature is not hex");
            return LinkStatus::InvalidSignature;
        }
    };

    let mac = match new_mac(secret, organization, expiry_s) {
        Some(m) => m,
        None => return LinkStatus::InvalidSignature,
    };
    // verify_slice compares in constant time.
    if mac.verify_slice(&provided).is_err() {
        warn!(
            "validate_link: signature mismatch for organization {:?}",
            organization
        );
        return LinkStatus::InvalidSignature;
    }

    if now > expiry {
        warn!(
            "validate_link: link for {:?} expired at {} (now {})",
            organization, expiry, now
        );
        return LinkStatus::Expired;
    }

    LinkStatus::Valid(organization.to_string())
}
