use crate::intake::*;

use likert_survey::{Catalog, GateMode, Item, SurveyRules};
use serde::{Deserialize, Serialize};

/// Organization granted to requests without link parameters when the configuration names none.
pub const DEFAULT_ORGANIZATION: &str = "Open access";
/// Environment variable read for the link secret when the configuration names none.
pub const DEFAULT_SECRET_ENV: &str = "INTAKE_LINK_SECRET";

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// "csv" or "sheets"
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: Option<String>,
    #[serde(rename = "spreadsheetId")]
    pub spreadsheet_id: Option<String>,
    pub worksheet: Option<String>,
    #[serde(rename = "accessToken")]
    pub access_token: Option<String>,
    #[serde(rename = "accessTokenEnv")]
    pub access_token_env: Option<String>,
    #[serde(rename = "apiBaseUrl")]
    pub api_base_url: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    pub block: String,
    pub id: String,
    pub text: String,
    pub reversed: Option<bool>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct IntakeConfig {
    #[serde(rename = "formTitle")]
    pub form_title: Option<String>,
    #[serde(rename = "defaultOrganization")]
    pub default_organization: Option<String>,
    #[serde(rename = "linkSecret")]
    pub link_secret: Option<String>,
    #[serde(rename = "linkSecretEnv")]
    pub link_secret_env: Option<String>,
    #[serde(rename = "catalogPath")]
    pub catalog_path: Option<String>,
    #[serde(rename = "submissionGate")]
    pub submission_gate: Option<bool>,
    #[serde(rename = "sessionTtlSecs")]
    pub session_ttl_secs: Option<u64>,
    pub store: Option<StoreSettings>,
    /// Directory used to resolve the relative paths of the configuration.
    #[serde(skip)]
    pub root_dir: PathBuf,
}

impl IntakeConfig {
    pub fn form_title(&self) -> String {
        self.form_title
            .clone()
            .unwrap_or_else(|| "Questionnaire".to_string())
    }

    pub fn rules(&self) -> SurveyRules {
        let mut rules = SurveyRules::new(
            self.default_organization
                .as_deref()
                .unwrap_or(DEFAULT_ORGANIZATION),
        );
        rules.gate = match self.submission_gate {
            Some(false) => GateMode::Open,
            _ => GateMode::HalfOfCatalog,
        };
        if let Some(ttl) = self.session_ttl_secs {
            rules.session_ttl_secs = ttl;
        }
        rules
    }

    /// The signing key: the `linkSecret` value, or else the environment variable.
    pub fn link_secret(&self) -> IntakeResult<Vec<u8>> {
        if let Some(s) = self.link_secret.as_ref().filter(|s| !s.is_empty()) {
            return Ok(s.as_bytes().to_vec());
        }
        let env = self
            .link_secret_env
            .clone()
            .unwrap_or_else(|| DEFAULT_SECRET_ENV.to_string());
        match std::env::var(&env) {
            Ok(s) if !s.is_empty() => Ok(s.into_bytes()),
            _ => MissingSecretSnafu { env }.fail(),
        }
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        self.root_dir.join(path)
    }
}

pub fn read_config(path: &str) -> IntakeResult<IntakeConfig> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let mut config: IntakeConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    config.root_dir = Path::new(path)
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_default();
    debug!("read_config: {:?}", config);
    Ok(config)
}

/// The catalog file of the configuration, or the built-in inventory.
pub fn read_catalog(config: &IntakeConfig) -> IntakeResult<Catalog> {
    let lpath = match &config.catalog_path {
        Some(p) => p,
        None => {
            info!("Using the built-in catalog");
            return Ok(Catalog::builtin());
        }
    };
    let p = config.resolve(lpath).display().to_string();
    info!("Attempting to read catalog file {:?}", p);
    let contents = fs::read_to_string(&p).context(OpeningFileSnafu { path: p.clone() })?;
    let items: Vec<CatalogItem> =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path: p.clone() })?;
    Catalog::new(
        items
            .iter()
            .map(|ci| {
                Item::new(
                    ci.block.as_str(),
                    ci.id.as_str(),
                    ci.text.as_str(),
                    ci.reversed.unwrap_or(false),
                )
            })
            .collect(),
    )
    .context(InvalidCatalogSnafu { path: p })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_config() {
        let js = r#"{
            "formTitle": "Essential Factors",
            "defaultOrganization": "Open Institute",
            "linkSecret": "s3cret",
            "submissionGate": false,
            "sessionTtlSecs": 120,
            "store": {"provider": "csv", "filePath": "out.csv"}
        }"#;
        let config: IntakeConfig = serde_json::from_str(js).unwrap();
        let rules = config.rules();
        assert_eq!(rules.default_organization, "Open Institute");
        assert_eq!(rules.gate, GateMode::Open);
        assert_eq!(rules.session_ttl_secs, 120);
        assert_eq!(config.link_secret().unwrap(), b"s3cret".to_vec());
        assert_eq!(config.form_title(), "Essential Factors");
        assert_eq!(
            config.store.unwrap().file_path,
            Some("out.csv".to_string())
        );
    }

    #[test]
    fn defaults() {
        let config: IntakeConfig = serde_json::from_str("{}").unwrap();
        let rules = config.rules();
        assert_eq!(rules.default_organization, DEFAULT_ORGANIZATION);
        assert_eq!(rules.gate, GateMode::HalfOfCatalog);
        assert_eq!(read_catalog(&config).unwrap(), Catalog::builtin());
    }

    #[test]
    fn missing_secret() {
        let config = IntakeConfig {
            link_secret_env: Some("INTAKE_TEST_SECRET_THAT_IS_NOT_SET".to_string()),
            ..IntakeConfig::default()
        };
        assert!(matches!(
            config.link_secret(),
            Err(IntakeError::MissingSecret { .. })
        ));
    }

    #[test]
    fn reads_catalog_file() {
        let dir = std::env::temp_dir().join(format!("intake-catalog-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("items.json"),
            r#"[{"block": "A", "id": "A1", "text": "first"},
                {"block": "A", "id": "A2", "text": "second", "reversed": true}]"#,
        )
        .unwrap();
        fs::write(dir.join("dup.json"), r#"[{"block": "A", "id": "A1", "text": "x"},
            {"block": "B", "id": "A1", "text": "y"}]"#)
        .unwrap();
        let mut config = IntakeConfig {
            catalog_path: Some("items.json".to_string()),
            root_dir: dir.clone(),
            ..IntakeConfig::default()
        };
        let catalog = read_catalog(&config).unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.get("A2").unwrap().reversed);

        config.catalog_path = Some("dup.json".to_string());
        assert!(matches!(
            read_catalog(&config),
            Err(IntakeError::InvalidCatalog { .. })
        ));
        fs::remove_dir_all(&dir).unwrap();
    }
}
