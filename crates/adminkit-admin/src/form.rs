//! Declarative form descriptions.
//!
//! A [`FormSchema`] is what a settings page or an entity edit form hands to
//! the admin UI: sections with a legend and a list of inputs. Rendering is
//! left to the UI; the schema serializes to JSON.

use serde::{Deserialize, Serialize};

/// One form input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormInput {
    /// Field name; also the configuration key or column name. A trailing
    /// `[]` marks a multi-value input.
    pub name: String,
    /// Input type (`text`, `textarea`, `switch`, `select`, `categories`...).
    #[serde(rename = "type")]
    pub field_type: String,
    /// Label shown next to the input.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
    /// One value per language.
    #[serde(default)]
    pub lang: bool,
    /// Accepts several values.
    #[serde(default)]
    pub multiple: bool,
    /// Required on submit.
    #[serde(default)]
    pub required: bool,
    /// Choices for `select` inputs, as `(value, label)` pairs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<(String, String)>,
    /// Selected category ids of a `categories` tree, filled when the form
    /// values are loaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_categories: Option<Vec<String>>,
}

impl FormInput {
    /// Creates an input of the given type.
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            label: String::new(),
            lang: false,
            multiple: false,
            required: false,
            options: Vec::new(),
            selected_categories: None,
        }
    }

    /// A single-line text input.
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, "text")
    }

    /// A multi-line text input; the only type allowed to keep HTML.
    pub fn textarea(name: impl Into<String>) -> Self {
        Self::new(name, "textarea")
    }

    /// An on/off switch.
    pub fn switch(name: impl Into<String>) -> Self {
        Self::new(name, "switch")
    }

    /// A category tree.
    pub fn categories(name: impl Into<String>) -> Self {
        Self::new(name, "categories")
    }

    /// Sets the label.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Marks the input as per-language.
    #[must_use]
    pub const fn lang(mut self) -> Self {
        self.lang = true;
        self
    }

    /// Marks the input as multi-value.
    #[must_use]
    pub const fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    /// Marks the input as required.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Adds a select choice.
    #[must_use]
    pub fn option(mut self, value: impl Into<String>, label: impl Into<String>) -> Self {
        self.options.push((value.into(), label.into()));
        self
    }

    /// The storage key: the name without a trailing `[]`.
    pub fn storage_key(&self) -> &str {
        self.name.strip_suffix("[]").unwrap_or(&self.name)
    }

    /// Returns `true` for `categories` inputs.
    pub fn is_categories(&self) -> bool {
        self.field_type == "categories"
    }

    /// Returns `true` if the submitted value may keep HTML markup.
    pub fn allows_html(&self) -> bool {
        self.field_type == "textarea"
    }
}

/// A titled group of inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSection {
    /// Section title.
    pub legend: String,
    /// Inputs in display order.
    pub inputs: Vec<FormInput>,
    /// Submit button label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit: Option<String>,
}

impl FormSection {
    /// Creates a section with a `Save` button.
    pub fn new(legend: impl Into<String>) -> Self {
        Self {
            legend: legend.into(),
            inputs: Vec::new(),
            submit: Some("Save".to_string()),
        }
    }

    /// Appends an input.
    #[must_use]
    pub fn input(mut self, input: FormInput) -> Self {
        self.inputs.push(input);
        self
    }
}

/// A complete form: ordered sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSchema {
    /// Sections in display order.
    pub sections: Vec<FormSection>,
}

impl FormSchema {
    /// Creates an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a section.
    #[must_use]
    pub fn section(mut self, section: FormSection) -> Self {
        self.sections.push(section);
        self
    }

    /// Iterates over every input of every section.
    pub fn inputs(&self) -> impl Iterator<Item = &FormInput> {
        self.sections.iter().flat_map(|s| s.inputs.iter())
    }

    /// Iterates mutably over every input of every section.
    pub fn inputs_mut(&mut self) -> impl Iterator<Item = &mut FormInput> {
        self.sections.iter_mut().flat_map(|s| s.inputs.iter_mut())
    }
}
