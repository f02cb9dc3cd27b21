use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dom::{Compound, PanelLookup, Query};

pub const CONFIG_FILE_NAME: &str = "dropdowns.yaml";
pub const CONFIG_ENV_VAR: &str = "MENUBIND_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read dropdown config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("`{field}` is not a valid CSS identifier: {value:?}")]
    InvalidIdentifier { field: String, value: String },
    #[error("at least one trigger group is required")]
    NoGroups,
    #[error("trigger group `{0}` is defined more than once")]
    DuplicateGroup(String),
    #[error("trigger group `{0}` needs at least one panel lookup")]
    EmptyLookup(String),
    #[error("trigger group `{0}` matches nothing: give it classes or the framework marker")]
    EmptyGroup(String),
}

/// Class and attribute conventions shared by every trigger group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Markers {
    pub panel_class: String,
    pub shown_class: String,
    pub container_class: String,
    pub expanded_attribute: String,
    pub framework_attribute: String,
    pub framework_value: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            panel_class: "dropdown-menu".into(),
            shown_class: "show".into(),
            container_class: "dropdown".into(),
            expanded_attribute: "aria-expanded".into(),
            framework_attribute: "data-bs-toggle".into(),
            framework_value: "dropdown".into(),
        }
    }
}

/// A named set of triggers with its own panel lookup order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TriggerGroup {
    pub name: String,
    #[serde(default)]
    pub classes: Vec<String>,
    /// Also match elements carrying the framework's dropdown attribute.
    #[serde(default)]
    pub framework_marker: bool,
    /// Only match triggers below an element with this class.
    #[serde(default)]
    pub within: Option<String>,
    pub panel_lookup: Vec<PanelLookup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiagnosticsConfig {
    pub enabled: bool,
    pub delay_ms: u64,
    pub probe_container: String,
    pub ancestor_classes: Vec<String>,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_ms: 1000,
            probe_container: "topbar-user".into(),
            ancestor_classes: vec!["navbar".into(), "main-header".into()],
        }
    }
}

impl DiagnosticsConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DropdownConfig {
    pub markers: Markers,
    pub groups: Vec<TriggerGroup>,
    pub diagnostics: DiagnosticsConfig,
    pub global_entry_point: String,
}

impl Default for DropdownConfig {
    fn default() -> Self {
        Self {
            markers: Markers::default(),
            groups: vec![
                TriggerGroup {
                    name: "profile".into(),
                    classes: vec!["dropdown-toggle".into(), "profile-pic".into()],
                    framework_marker: false,
                    within: None,
                    panel_lookup: vec![PanelLookup::NextSibling],
                },
                TriggerGroup {
                    name: "general".into(),
                    classes: vec!["dropdown-toggle".into()],
                    framework_marker: true,
                    within: None,
                    panel_lookup: vec![
                        PanelLookup::NextSibling,
                        PanelLookup::Siblings,
                        PanelLookup::Descendants,
                    ],
                },
            ],
            diagnostics: DiagnosticsConfig::default(),
            global_entry_point: "reinitializeDropdowns".into(),
        }
    }
}

impl DropdownConfig {
    /// Load from `config_path` when it exists, defaults otherwise. The result
    /// is always validated.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = match config_path {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path)?;
                serde_yaml::from_str(&contents)?
            }
            _ => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// `<config dir>/dropdowns.yaml` for the current user, if a home
    /// directory can be determined.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "Menubind", "menubind")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Pick the config file: an explicit path, then the `MENUBIND_CONFIG`
    /// value, then [`DropdownConfig::default_path`]. Empty values are skipped.
    pub fn resolve_path(explicit: Option<PathBuf>, env_value: Option<String>) -> Option<PathBuf> {
        explicit
            .or_else(|| {
                env_value
                    .filter(|value| !value.trim().is_empty())
                    .map(PathBuf::from)
            })
            .or_else(Self::default_path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let markers = &self.markers;
        for (field, value) in [
            ("markers.panel_class", &markers.panel_class),
            ("markers.shown_class", &markers.shown_class),
            ("markers.container_class", &markers.container_class),
            ("markers.expanded_attribute", &markers.expanded_attribute),
            ("markers.framework_attribute", &markers.framework_attribute),
            ("diagnostics.probe_container", &self.diagnostics.probe_container),
        ] {
            check_identifier(field, value)?;
        }
        for class in &self.diagnostics.ancestor_classes {
            check_identifier("diagnostics.ancestor_classes", class)?;
        }

        if self.groups.is_empty() {
            return Err(ConfigError::NoGroups);
        }
        let mut seen = HashSet::new();
        for group in &self.groups {
            if !seen.insert(group.name.as_str()) {
                return Err(ConfigError::DuplicateGroup(group.name.clone()));
            }
            if group.panel_lookup.is_empty() {
                return Err(ConfigError::EmptyLookup(group.name.clone()));
            }
            if group.classes.is_empty() && !group.framework_marker {
                return Err(ConfigError::EmptyGroup(group.name.clone()));
            }
            for class in &group.classes {
                check_identifier(&format!("groups.{}.classes", group.name), class)?;
            }
            if let Some(scope) = &group.within {
                check_identifier(&format!("groups.{}.within", group.name), scope)?;
            }
        }
        Ok(())
    }

    /// Query matching the triggers of one group.
    pub fn group_query(&self, group: &TriggerGroup) -> Query {
        let scope = group.within.as_deref();
        let mut alternatives = Vec::new();
        if !group.classes.is_empty() {
            let compound = group
                .classes
                .iter()
                .fold(Compound::default(), |compound, class| compound.with_class(class));
            alternatives.push(compound.within(scope));
        }
        if group.framework_marker {
            alternatives.push(self.framework_compound().within(scope));
        }
        Query::new(alternatives)
    }

    /// Union of every group's trigger query.
    pub fn trigger_query(&self) -> Query {
        self.groups
            .iter()
            .fold(Query::default(), |query, group| {
                query.or(self.group_query(group))
            })
    }

    fn framework_compound(&self) -> Compound {
        Compound::attr(
            &self.markers.framework_attribute,
            Some(&self.markers.framework_value),
        )
    }

    pub fn panel_query(&self) -> Query {
        Query::class(&self.markers.panel_class)
    }

    pub fn shown_panel_query(&self) -> Query {
        self.panel_query().with_class(&self.markers.shown_class)
    }

    pub fn expanded_trigger_query(&self) -> Query {
        self.trigger_query()
            .with_attr(&self.markers.expanded_attribute, Some("true"))
    }

    pub fn container_query(&self) -> Query {
        Query::class(&self.markers.container_class)
    }
}

/// Accepts the identifiers page markup actually uses: ASCII letters, digits,
/// `-` and `_`, not starting with a digit.
fn check_identifier(field: &str, value: &str) -> Result<(), ConfigError> {
    let mut chars = value.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == '-' => chars
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'),
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier {
            field: field.to_string(),
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn loads_default() {
        let config = DropdownConfig::load(None).unwrap();
        assert_eq!(config.groups.len(), 2);
        assert_eq!(config.global_entry_point, "reinitializeDropdowns");
        assert_eq!(config.diagnostics.delay(), Duration::from_secs(1));
    }

    #[test]
    fn config_path_resolution_order() {
        let explicit = PathBuf::from("/tmp/explicit.yaml");
        assert_eq!(
            DropdownConfig::resolve_path(Some(explicit.clone()), Some("/tmp/env.yaml".into())),
            Some(explicit)
        );
        assert_eq!(
            DropdownConfig::resolve_path(None, Some("/tmp/env.yaml".into())),
            Some(PathBuf::from("/tmp/env.yaml"))
        );
        assert_eq!(
            DropdownConfig::resolve_path(None, Some("  ".into())),
            DropdownConfig::default_path()
        );
        if let Some(path) = DropdownConfig::resolve_path(None, None) {
            assert!(path.ends_with(CONFIG_FILE_NAME));
            assert_eq!(Some(path), DropdownConfig::default_path());
        }
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config =
            DropdownConfig::load(Some(PathBuf::from("/definitely/not/here.yaml"))).unwrap();
        assert_eq!(config, DropdownConfig::default());
    }

    #[test]
    fn loads_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        use std::io::Write;
        writeln!(
            file,
            "markers:\n  shown_class: open\ngroups:\n  - name: nav\n    classes: [nav-toggle]\n    within: topbar-nav\n    panel_lookup: [siblings]\ndiagnostics:\n  enabled: false"
        )
        .unwrap();
        let config = DropdownConfig::load(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.markers.shown_class, "open");
        assert_eq!(config.markers.panel_class, "dropdown-menu");
        assert_eq!(config.groups.len(), 1);
        assert_eq!(config.groups[0].panel_lookup, vec![PanelLookup::Siblings]);
        assert!(!config.diagnostics.enabled);
        assert_eq!(config.diagnostics.delay_ms, 1000);
        assert_eq!(
            config.trigger_query().to_css(),
            ".topbar-nav .nav-toggle"
        );
    }

    #[test]
    fn default_queries_render() {
        let config = DropdownConfig::default();
        assert_eq!(
            config.trigger_query().to_css(),
            r#".dropdown-toggle.profile-pic, .dropdown-toggle, [data-bs-toggle="dropdown"]"#
        );
        assert_eq!(config.shown_panel_query().to_css(), ".dropdown-menu.show");
        assert_eq!(
            config.expanded_trigger_query().to_css(),
            r#".dropdown-toggle.profile-pic[aria-expanded="true"], .dropdown-toggle[aria-expanded="true"], [data-bs-toggle="dropdown"][aria-expanded="true"]"#
        );
    }

    #[test]
    fn rejects_bad_identifiers() {
        let err = DropdownConfig::from_yaml("markers:\n  shown_class: \"show now\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidIdentifier { .. }));

        let err = DropdownConfig::from_yaml(
            "groups:\n  - name: g\n    classes: [\"1st\"]\n    panel_lookup: [next-sibling]\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidIdentifier { .. }));
    }

    #[test]
    fn rejects_degenerate_groups() {
        assert!(matches!(
            DropdownConfig::from_yaml("groups: []\n").unwrap_err(),
            ConfigError::NoGroups
        ));
        assert!(matches!(
            DropdownConfig::from_yaml("groups:\n  - name: g\n    classes: [a]\n    panel_lookup: []\n")
                .unwrap_err(),
            ConfigError::EmptyLookup(_)
        ));
        assert!(matches!(
            DropdownConfig::from_yaml("groups:\n  - name: g\n    panel_lookup: [siblings]\n")
                .unwrap_err(),
            ConfigError::EmptyGroup(_)
        ));
        assert!(matches!(
            DropdownConfig::from_yaml(
                "groups:\n  - name: g\n    classes: [a]\n    panel_lookup: [siblings]\n  - name: g\n    classes: [b]\n    panel_lookup: [siblings]\n"
            )
            .unwrap_err(),
            ConfigError::DuplicateGroup(_)
        ));
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(matches!(
            DropdownConfig::from_yaml("markers:\n  shwon_class: show\n").unwrap_err(),
            ConfigError::Yaml(_)
        ));
    }
}
