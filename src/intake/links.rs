// Query strings of signed links.

use crate::intake::*;

use likert_survey::link::{LinkGrant, LinkParams};
use serde::{Deserialize, Serialize};

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
struct LinkQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    org: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sig: Option<String>,
}

pub fn to_query(grant: &LinkGrant) -> IntakeResult<String> {
    let q = LinkQuery {
        org: Some(grant.organization.clone()),
        exp: Some(grant.expiry.to_string()),
        sig: Some(grant.signature.clone()),
    };
    serde_urlencoded::to_string(&q).context(EncodingLinkSnafu {})
}

pub fn link_url(base: &str, query: &str) -> String {
    let sep = if base.contains('?') { '&' } else { '?' };
    format!("{}{}{}", base, sep, query)
}

/// Reads the link parameters of a full URL or of a bare query string.
/// Other parameters are ignored.
pub fn parse_link(link: &str) -> IntakeResult<LinkParams> {
    let without_fragment = link.split('#').next().unwrap_or_default();
    let query = match without_fragment.split_once('?') {
        Some((_, q)) => q,
        // A URL without a query carries no parameters.
        None if without_fragment.contains("://") => "",
        None => without_fragment,
    };
    let q: LinkQuery =
        serde_urlencoded::from_str(query).context(ParsingLinkSnafu { link })?;
    debug!("parse_link: {:?}", q);
    Ok(LinkParams {
        organization: q.org,
        expiry: q.exp,
        signature: q.sig,
    })
}

fn present(x: &Option<String>) -> bool {
    x.as_deref().map_or(false, |s| !s.is_empty())
}

/// True when the link carries everything needed to check its signature.
pub fn has_all_params(params: &LinkParams) -> bool {
    [&params.organization, &params.expiry, &params.signature]
        .iter()
        .all(|x| present(x))
}
