//! Raw field definitions
//!
//! `FieldDef` is the loosely typed, object-literal form of a field. It can be
//! deserialized from JSON/YAML documents or assembled with the builder
//! methods below, which are also the only way to attach closures:
//!
//! ```ignore
//! let fields = vec![
//!     FieldDef::switch("emailNotifications").default_value(true),
//!     FieldDef::switch("weeklyDigest")
//!         .disabled_when(|data, _| data["emailNotifications"] != true),
//! ];
//! ```

use serde::Deserialize;
use serde_json::{Map, Value};
use std::future::Future;

use super::field::{
    CustomValidator, Dynamic, FieldStyle, OptionContext, OptionEntry, OptionSource, ValidationContext,
    Verdict,
};

/// `label` is either text or `false` (explicitly no label)
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LabelDef {
    Text(String),
    Flag(bool),
}

/// One field definition, leaf or container, before normalization
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    #[serde(rename = "type")]
    pub field_type: Option<String>,
    pub name: Option<String>,
    pub label: Option<LabelDef>,
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    pub hidden: Option<Dynamic<bool>>,
    pub condition: Option<Dynamic<bool>>,
    pub disabled: Option<Dynamic<bool>>,
    pub read_only: Option<Dynamic<bool>>,
    pub default_value: Option<Value>,
    #[serde(default)]
    pub style: FieldStyle,
    #[serde(default)]
    pub ui: Map<String, Value>,

    // Built-in rule parameters
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub min_selected: Option<usize>,
    pub max_selected: Option<usize>,
    pub min_rows: Option<usize>,
    pub max_rows: Option<usize>,

    pub options: Option<OptionSource>,
    #[serde(skip)]
    pub validators: Vec<CustomValidator>,
    pub dependencies: Option<Vec<String>>,

    /// Children of `row`/`group`/`collapsible`, or the row template of `array`
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    /// Tabs of a `tabs` container
    #[serde(default)]
    pub tabs: Vec<TabDef>,
    /// Computed `ui.defaultTab`; a literal one is read from `ui`
    #[serde(skip)]
    pub default_tab: Option<Dynamic<Option<String>>>,
}

/// One tab of a `tabs` container
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabDef {
    pub name: Option<String>,
    pub label: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl TabDef {
    pub fn new(label: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        Self {
            label: Some(label.into()),
            fields,
            ..Default::default()
        }
    }

    /// Namespace this tab's fields under `name`
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl FieldDef {
    /// A definition with only its `type` discriminant set
    pub fn new(field_type: impl Into<String>) -> Self {
        Self {
            field_type: Some(field_type.into()),
            ..Default::default()
        }
    }

    fn leaf(field_type: &str, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(field_type)
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::leaf("text", name)
    }

    pub fn email(name: impl Into<String>) -> Self {
        Self::leaf("email", name)
    }

    pub fn password(name: impl Into<String>) -> Self {
        Self::leaf("password", name)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::leaf("number", name)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::leaf("date", name)
    }

    pub fn select(name: impl Into<String>) -> Self {
        Self::leaf("select", name)
    }

    pub fn radio(name: impl Into<String>) -> Self {
        Self::leaf("radio", name)
    }

    pub fn checkbox(name: impl Into<String>) -> Self {
        Self::leaf("checkbox", name)
    }

    pub fn switch(name: impl Into<String>) -> Self {
        Self::leaf("switch", name)
    }

    pub fn tags(name: impl Into<String>) -> Self {
        Self::leaf("tags", name)
    }

    pub fn textarea(name: impl Into<String>) -> Self {
        Self::leaf("textarea", name)
    }

    pub fn upload(name: impl Into<String>) -> Self {
        Self::leaf("upload", name)
    }

    /// Layout-only row; transparent for paths unless named
    pub fn row(fields: Vec<FieldDef>) -> Self {
        Self {
            fields,
            ..Self::new("row")
        }
    }

    pub fn group(fields: Vec<FieldDef>) -> Self {
        Self {
            fields,
            ..Self::new("group")
        }
    }

    pub fn collapsible(label: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        Self {
            fields,
            ..Self::new("collapsible").label(label)
        }
    }

    pub fn tabs(tabs: Vec<TabDef>) -> Self {
        Self {
            tabs,
            ..Self::new("tabs")
        }
    }

    /// Repeatable rows of `fields`, stored as a list under `name`
    pub fn array(name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        Self {
            name: Some(name.into()),
            fields,
            ..Self::new("array")
        }
    }

    // ========================================================================
    // Setters
    // ========================================================================

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(LabelDef::Text(label.into()));
        self
    }

    /// Render without a label (`label: false`)
    pub fn no_label(mut self) -> Self {
        self.label = Some(LabelDef::Flag(false));
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn hidden(mut self, hidden: impl Into<Dynamic<bool>>) -> Self {
        self.hidden = Some(hidden.into());
        self
    }

    pub fn hidden_when(self, f: impl Fn(&Value, &Value) -> bool + Send + Sync + 'static) -> Self {
        self.hidden(Dynamic::computed(f))
    }

    /// Show the field only while `f` holds
    pub fn show_when(mut self, f: impl Fn(&Value, &Value) -> bool + Send + Sync + 'static) -> Self {
        self.condition = Some(Dynamic::computed(f));
        self
    }

    pub fn condition(mut self, condition: impl Into<Dynamic<bool>>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn disabled(mut self, disabled: impl Into<Dynamic<bool>>) -> Self {
        self.disabled = Some(disabled.into());
        self
    }

    pub fn disabled_when(self, f: impl Fn(&Value, &Value) -> bool + Send + Sync + 'static) -> Self {
        self.disabled(Dynamic::computed(f))
    }

    pub fn read_only(mut self, read_only: impl Into<Dynamic<bool>>) -> Self {
        self.read_only = Some(read_only.into());
        self
    }

    pub fn read_only_when(self, f: impl Fn(&Value, &Value) -> bool + Send + Sync + 'static) -> Self {
        self.read_only(Dynamic::computed(f))
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn width(mut self, width: impl Into<String>) -> Self {
        self.style.width = Some(width.into());
        self
    }

    pub fn class_name(mut self, class_name: impl Into<String>) -> Self {
        self.style.class_name = Some(class_name.into());
        self
    }

    /// Set one kind-specific presentation option
    pub fn ui(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ui.insert(key.into(), value.into());
        self
    }

    pub fn min_length(mut self, min: usize) -> Self {
        self.min_length = Some(min);
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn min_selected(mut self, min: usize) -> Self {
        self.min_selected = Some(min);
        self
    }

    pub fn max_selected(mut self, max: usize) -> Self {
        self.max_selected = Some(max);
        self
    }

    pub fn min_rows(mut self, min: usize) -> Self {
        self.min_rows = Some(min);
        self
    }

    pub fn max_rows(mut self, max: usize) -> Self {
        self.max_rows = Some(max);
        self
    }

    pub fn options(mut self, options: Vec<OptionEntry>) -> Self {
        self.options = Some(OptionSource::Static(options));
        self
    }

    /// Load options asynchronously; refetched when a dependency changes
    pub fn options_from<F, Fut>(mut self, loader: F) -> Self
    where
        F: Fn(OptionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Vec<OptionEntry>>> + Send + 'static,
    {
        self.options = Some(OptionSource::dynamic(loader));
        self
    }

    pub fn validate(mut self, validator: CustomValidator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Attach a synchronous custom validator
    pub fn validate_with<V>(self, f: impl Fn(&Value, &ValidationContext) -> V + Send + Sync + 'static) -> Self
    where
        V: Into<Verdict>,
    {
        self.validate(CustomValidator::sync(move |value, ctx| f(value, ctx).into()))
    }

    pub fn depends_on<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn default_tab(self, tab: impl Into<String>) -> Self {
        self.ui("defaultTab", tab.into())
    }

    pub fn default_tab_when(
        mut self,
        f: impl Fn(&Value, &Value) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.default_tab = Some(Dynamic::computed(f));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_field_def() {
        let def: FieldDef = serde_json::from_value(json!({
            "type": "password",
            "name": "password",
            "required": true,
            "minLength": 8,
            "label": false,
            "disabled": { "falsy": "enabled" },
            "style": { "width": "50%", "className": "wide" }
        }))
        .unwrap();

        assert_eq!(def.field_type.as_deref(), Some("password"));
        assert_eq!(def.min_length, Some(8));
        assert_eq!(def.label, Some(LabelDef::Flag(false)));
        assert!(def.disabled.as_ref().unwrap().is_computed());
        assert_eq!(def.style.class_name.as_deref(), Some("wide"));
    }

    #[test]
    fn test_deserialize_nested_containers() {
        let def: FieldDef = serde_yaml::from_str(
            r#"
type: tabs
tabs:
  - label: Profile
    fields:
      - { type: text, name: firstName }
  - label: Billing
    name: billing
    fields:
      - { type: text, name: cardNumber }
"#,
        )
        .unwrap();

        assert_eq!(def.tabs.len(), 2);
        assert_eq!(def.tabs[1].name.as_deref(), Some("billing"));
        assert_eq!(def.tabs[1].fields[0].name.as_deref(), Some("cardNumber"));
    }

    #[test]
    fn test_builder_chains() {
        let def = FieldDef::select("country")
            .label("Country")
            .options(vec![OptionEntry::new("Norway", "no")])
            .depends_on(["region"])
            .validate_with(|value, _| value != "xx");

        assert_eq!(def.field_type.as_deref(), Some("select"));
        assert_eq!(def.dependencies, Some(vec!["region".to_string()]));
        assert_eq!(def.validators.len(), 1);
    }
}
