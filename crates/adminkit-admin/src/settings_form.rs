//! Settings pages backed by a [`ConfigurationStore`].
//!
//! A [`SettingsController`] owns a [`FormSchema`]. Rendering loads the
//! current value of every input from the store; submitting `submitOptions`
//! writes the request values back.
//!
//! Storage rules per input:
//!
//! - `categories`: the selected category ids, comma-joined.
//! - `multiple`: the key loses its trailing `[]`; values are comma-joined.
//! - `lang`: one value per active language, submitted as `<name>_<id_lang>`.
//! - HTML is kept for `textarea` inputs only.

use std::collections::BTreeMap;
use std::sync::Arc;

use adminkit_core::{AdminKitResult, Language, RequestContext, RequestValue};
use serde::{Deserialize, Serialize};

use crate::configuration::{ConfigValue, ConfigurationStore};
use crate::form::{FormInput, FormSchema, FormSection};

/// The request key that submits a settings form.
pub const SUBMIT_ACTION: &str = "submitOptions";

/// A loaded input value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// A single value.
    Text(String),
    /// The values of a `multiple` input.
    List(Vec<String>),
    /// One value per language id.
    PerLanguage(BTreeMap<i64, FieldValue>),
}

/// A settings form ready for the admin UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedForm {
    /// Sections, with category selections filled in.
    pub sections: Vec<FormSection>,
    /// Current values by input name.
    pub fields_value: BTreeMap<String, FieldValue>,
    /// Language selected when the form opens.
    pub default_form_language: i64,
    /// Languages the form offers.
    pub languages: Vec<Language>,
    /// Request key the submit button sends.
    pub submit_action: String,
}

/// Controller of one settings page.
pub struct SettingsController {
    name: String,
    schema: FormSchema,
    store: Arc<dyn ConfigurationStore>,
}

impl std::fmt::Debug for SettingsController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsController")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl SettingsController {
    /// Creates a settings page.
    pub fn new(
        name: impl Into<String>,
        schema: FormSchema,
        store: Arc<dyn ConfigurationStore>,
    ) -> Self {
        Self {
            name: name.into(),
            schema,
            store,
        }
    }

    /// The controller name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The form schema.
    pub const fn schema(&self) -> &FormSchema {
        &self.schema
    }

    /// Builds the form with its current values.
    pub async fn render_form(&self, ctx: &RequestContext) -> AdminKitResult<RenderedForm> {
        let mut schema = self.schema.clone();
        let fields_value = self.load_form_values(ctx, &mut schema).await?;
        Ok(RenderedForm {
            sections: schema.sections,
            fields_value,
            default_form_language: ctx.language.id,
            languages: ctx.languages.clone(),
            submit_action: SUBMIT_ACTION.to_string(),
        })
    }

    /// Loads the stored value of every named input of `schema`.
    ///
    /// Category inputs get their selection written into the schema and have
    /// no entry in the returned map.
    pub async fn load_form_values(
        &self,
        ctx: &RequestContext,
        schema: &mut FormSchema,
    ) -> AdminKitResult<BTreeMap<String, FieldValue>> {
        let shop = save_shop(ctx);
        let languages = ctx.active_language_ids();
        let mut values = BTreeMap::new();

        for input in schema.inputs_mut() {
            if input.name.is_empty() {
                continue;
            }

            if input.is_categories() {
                let stored = self.store.get(&input.name, None, shop).await?;
                input.selected_categories = Some(split_list(stored.as_deref()));
                continue;
            }

            let value = if input.lang {
                let mut per_lang = BTreeMap::new();
                for &lang in &languages {
                    per_lang.insert(lang, self.load_field(input, Some(lang), shop).await?);
                }
                FieldValue::PerLanguage(per_lang)
            } else {
                self.load_field(input, None, shop).await?
            };
            values.insert(input.name.clone(), value);
        }

        Ok(values)
    }

    /// Saves the form when the request submits it. Returns whether it did.
    pub async fn dispatch_action(&self, ctx: &RequestContext) -> AdminKitResult<bool> {
        if !ctx.is_submit(SUBMIT_ACTION) {
            return Ok(false);
        }
        self.save_form(ctx).await?;
        Ok(true)
    }

    /// Writes the submitted value of every named, typed input to the store.
    pub async fn save_form(&self, ctx: &RequestContext) -> AdminKitResult<()> {
        let shop = save_shop(ctx);
        let languages = ctx.active_language_ids();
        let mut saved = 0_usize;

        for input in self.schema.inputs() {
            if input.name.is_empty() || input.field_type.is_empty() {
                continue;
            }

            if input.is_categories() {
                let ids = match ctx.value(&input.name) {
                    Some(value @ (RequestValue::List(_) | RequestValue::Map(_))) => value.flatten(),
                    _ => Vec::new(),
                };
                self.store
                    .update(&input.name, ConfigValue::Single(ids.join(",")), false, shop)
                    .await?;
                saved += 1;
                continue;
            }

            let key = field_key(input);
            let value = if input.lang {
                ConfigValue::PerLanguage(
                    languages
                        .iter()
                        .map(|lang| (*lang, submitted_text(ctx.value(&format!("{key}_{lang}")))))
                        .collect(),
                )
            } else {
                ConfigValue::Single(submitted_text(ctx.value(key)))
            };
            self.store
                .update(key, value, input.allows_html(), shop)
                .await?;
            saved += 1;
        }

        tracing::info!(controller = %self.name, saved, ?shop, "settings saved");
        Ok(())
    }

    async fn load_field(
        &self,
        input: &FormInput,
        lang: Option<i64>,
        shop: Option<i64>,
    ) -> AdminKitResult<FieldValue> {
        let stored = self.store.get(field_key(input), lang, shop).await?;
        Ok(if input.multiple {
            FieldValue::List(split_list(stored.as_deref()))
        } else {
            FieldValue::Text(stored.unwrap_or_default())
        })
    }
}

/// Returns `true` when every element of `values` is itself a list or map.
pub fn is_nested_array(values: &[RequestValue]) -> bool {
    values
        .iter()
        .all(|v| matches!(v, RequestValue::List(_) | RequestValue::Map(_)))
}

/// The storage key of an input: `multiple` inputs drop their `[]`.
fn field_key(input: &FormInput) -> &str {
    if input.multiple {
        input.storage_key()
    } else {
        &input.name
    }
}

/// The shop settings are stored for: the selected shop on a multishop
/// installation, otherwise installation-wide.
fn save_shop(ctx: &RequestContext) -> Option<i64> {
    if ctx.multishop_active {
        ctx.selected_shop_id()
    } else {
        None
    }
}

fn split_list(stored: Option<&str>) -> Vec<String> {
    match stored {
        None | Some("") => Vec::new(),
        Some(s) => s.split(',').map(str::to_string).collect(),
    }
}

fn submitted_text(value: Option<&RequestValue>) -> String {
    match value {
        None => String::new(),
        Some(RequestValue::Scalar(s)) => s.clone(),
        Some(list @ (RequestValue::List(_) | RequestValue::Map(_))) => list.flatten().join(","),
    }
}
