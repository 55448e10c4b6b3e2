use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Campaign attribution parameters, a fixed enumerated set copied verbatim
/// from the query string. Unknown keys are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignParams {
    #[serde(default)]
    pub utm_source: String,
    #[serde(default)]
    pub utm_medium: String,
    #[serde(default)]
    pub utm_campaign: String,
    #[serde(default)]
    pub utm_term: String,
    #[serde(default)]
    pub utm_content: String,
    #[serde(default, rename = "ref")]
    pub referrer: String,
    #[serde(default)]
    pub variant: String,
}

impl CampaignParams {
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        let raw = query.trim_start_matches('?');
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            let slot = match key.as_ref() {
                "utm_source" => &mut params.utm_source,
                "utm_medium" => &mut params.utm_medium,
                "utm_campaign" => &mut params.utm_campaign,
                "utm_term" => &mut params.utm_term,
                "utm_content" => &mut params.utm_content,
                "ref" => &mut params.referrer,
                "variant" => &mut params.variant,
                _ => continue,
            };
            *slot = value.into_owned();
        }
        params
    }
}

/// Identifies a browsing session across resumes. The session id is reused
/// from storage even when the snapshot itself is invalidated; it changes
/// only on explicit restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingContext {
    pub session_id: String,
    pub tag: String,
    pub params: CampaignParams,
}

impl TrackingContext {
    pub fn new(tag: impl Into<String>, params: CampaignParams) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            tag: tag.into(),
            params,
        }
    }

    /// Same tag and attribution under a fresh session id.
    pub fn regenerate(&self) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            tag: self.tag.clone(),
            params: self.params.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_only_known_query_keys() {
        let params =
            CampaignParams::from_query("?utm_source=news&ref=partner&junk=1&variant=b&page=3");
        assert_eq!(params.utm_source, "news");
        assert_eq!(params.referrer, "partner");
        assert_eq!(params.variant, "b");
        assert_eq!(params.utm_medium, "");
    }

    #[test]
    fn regenerate_keeps_attribution() {
        let original = TrackingContext::new("audit", CampaignParams::from_query("utm_source=x"));
        let fresh = original.regenerate();
        assert_ne!(original.session_id, fresh.session_id);
        assert_eq!(original.tag, fresh.tag);
        assert_eq!(original.params, fresh.params);
    }
}
