//! The explicit per-request context.
//!
//! Admin operations never reach for an ambient "current shop / language /
//! request" global. Everything they need is carried by a [`RequestContext`]
//! that the caller builds once per request and passes down.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Deserializer, Serialize};

/// A shop known to the host installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shop {
    /// Shop identifier (`id_shop`).
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Whether the shop is active.
    pub active: bool,
}

impl Shop {
    /// Creates an active shop.
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            active: true,
        }
    }
}

/// A language known to the host installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    /// Language identifier (`id_lang`).
    pub id: i64,
    /// ISO code (e.g. "en").
    pub iso_code: String,
    /// Whether the language is active.
    pub active: bool,
}

impl Language {
    /// Creates an active language.
    pub fn new(id: i64, iso_code: impl Into<String>) -> Self {
        Self {
            id,
            iso_code: iso_code.into(),
            active: true,
        }
    }
}

/// Which shops the administrator is currently editing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ShopContext {
    /// All shops at once.
    All,
    /// Every shop of one shop group.
    Group(i64),
    /// Exactly one shop.
    Shop(i64),
}

/// A submitted request value: a scalar, a (possibly nested) list, or a map.
///
/// Deserializes from any JSON value: strings, numbers and booleans become
/// scalars, arrays become lists, objects become maps (mirroring how
/// `name[key]=value` form fields arrive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RequestValue {
    /// A single value.
    Scalar(String),
    /// A list of values (`name[]` fields, position payloads, category trees).
    List(Vec<RequestValue>),
    /// Values by key (`name[key]` fields).
    Map(BTreeMap<String, RequestValue>),
}

impl RequestValue {
    /// Returns the scalar string, or `None` for lists and maps.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(s) => Some(s),
            Self::List(_) | Self::Map(_) => None,
        }
    }

    /// Returns the list items, or `None` for scalars and maps.
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            Self::Scalar(_) | Self::Map(_) => None,
        }
    }

    /// Returns the items keyed by their integer index, sorted by index.
    ///
    /// A list numbers its items from `0`; a map uses its keys, skipping the
    /// ones that are not integers. Scalars yield `None`.
    pub fn indexed(&self) -> Option<Vec<(i64, &Self)>> {
        match self {
            Self::Scalar(_) => None,
            Self::List(items) => Some((0_i64..).zip(items.iter()).collect()),
            Self::Map(map) => {
                let mut items: Vec<(i64, &Self)> = map
                    .iter()
                    .filter_map(|(k, v)| k.trim().parse().ok().map(|i| (i, v)))
                    .collect();
                items.sort_by_key(|(i, _)| *i);
                Some(items)
            }
        }
    }

    /// Parses the scalar as an integer; lists and garbage yield `None`.
    pub fn as_int(&self) -> Option<i64> {
        self.as_str().and_then(|s| s.trim().parse().ok())
    }

    /// Returns `true` for a list or map whose every element is itself a
    /// list or map.
    pub fn is_nested_list(&self) -> bool {
        let nested = |item: &Self| matches!(item, Self::List(_) | Self::Map(_));
        match self {
            Self::Scalar(_) => false,
            Self::List(items) => items.iter().all(nested),
            Self::Map(map) => map.values().all(nested),
        }
    }

    /// Collects every scalar in depth-first order, map values in key order.
    pub fn flatten(&self) -> Vec<String> {
        match self {
            Self::Scalar(s) => vec![s.clone()],
            Self::List(items) => items.iter().flat_map(Self::flatten).collect(),
            Self::Map(map) => map.values().flat_map(Self::flatten).collect(),
        }
    }
}

impl From<&str> for RequestValue {
    fn from(v: &str) -> Self {
        Self::Scalar(v.to_string())
    }
}

impl From<String> for RequestValue {
    fn from(v: String) -> Self {
        Self::Scalar(v)
    }
}

impl From<i64> for RequestValue {
    fn from(v: i64) -> Self {
        Self::Scalar(v.to_string())
    }
}

impl<T: Into<Self>> From<Vec<T>> for RequestValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<serde_json::Value> for RequestValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Scalar(String::new()),
            serde_json::Value::Bool(b) => Self::Scalar(if b { "1" } else { "0" }.to_string()),
            serde_json::Value::Number(n) => Self::Scalar(n.to_string()),
            serde_json::Value::String(s) => Self::Scalar(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl<'de> Deserialize<'de> for RequestValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from)
    }
}

/// Everything an admin operation needs to know about the current request.
///
/// # Examples
///
/// ```
/// use adminkit_core::context::{Language, RequestContext, Shop, ShopContext};
///
/// let ctx = RequestContext::new(Shop::new(1, "Main"), Language::new(1, "en"))
///     .with_shops(vec![Shop::new(1, "Main"), Shop::new(2, "Outlet")])
///     .with_multishop(true)
///     .with_shop_context(ShopContext::All)
///     .with_value("way", "1");
///
/// assert!(!ctx.is_single_shop());
/// assert_eq!(ctx.int_value("way"), Some(1));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// The shop the request is bound to.
    pub shop: Shop,
    /// The shop selection of the admin session.
    pub shop_context: ShopContext,
    /// Whether the multishop feature is enabled on the installation.
    pub multishop_active: bool,
    /// All shops of the installation.
    pub shops: Vec<Shop>,
    /// The language of the admin employee.
    pub language: Language,
    /// All languages of the installation.
    pub languages: Vec<Language>,
    /// Whether this is an ajax request.
    pub ajax: bool,
    /// Base URL of the admin controller, used to build links.
    pub admin_url: String,
    /// Submitted GET/POST values.
    pub values: HashMap<String, RequestValue>,
}

impl RequestContext {
    /// Creates a single-shop, single-language context.
    pub fn new(shop: Shop, language: Language) -> Self {
        Self {
            shop_context: ShopContext::Shop(shop.id),
            shops: vec![shop.clone()],
            shop,
            multishop_active: false,
            languages: vec![language.clone()],
            language,
            ajax: false,
            admin_url: "index.php".to_string(),
            values: HashMap::new(),
        }
    }

    /// Sets the shop list.
    #[must_use]
    pub fn with_shops(mut self, shops: Vec<Shop>) -> Self {
        self.shops = shops;
        self
    }

    /// Sets the language list.
    #[must_use]
    pub fn with_languages(mut self, languages: Vec<Language>) -> Self {
        self.languages = languages;
        self
    }

    /// Enables or disables the multishop feature.
    #[must_use]
    pub const fn with_multishop(mut self, active: bool) -> Self {
        self.multishop_active = active;
        self
    }

    /// Sets the shop selection.
    #[must_use]
    pub const fn with_shop_context(mut self, shop_context: ShopContext) -> Self {
        self.shop_context = shop_context;
        self
    }

    /// Marks the request as ajax.
    #[must_use]
    pub const fn with_ajax(mut self, ajax: bool) -> Self {
        self.ajax = ajax;
        self
    }

    /// Sets the admin base URL.
    #[must_use]
    pub fn with_admin_url(mut self, url: impl Into<String>) -> Self {
        self.admin_url = url.into();
        self
    }

    /// Adds a submitted value.
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<RequestValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Returns `true` when exactly one shop is selected.
    pub const fn is_single_shop(&self) -> bool {
        matches!(self.shop_context, ShopContext::Shop(_))
    }

    /// Returns the selected shop id when a single shop is selected.
    pub const fn selected_shop_id(&self) -> Option<i64> {
        match self.shop_context {
            ShopContext::Shop(id) => Some(id),
            ShopContext::All | ShopContext::Group(_) => None,
        }
    }

    /// Looks up a shop by id.
    pub fn find_shop(&self, id: i64) -> Option<&Shop> {
        self.shops.iter().find(|s| s.id == id)
    }

    /// Returns the shops that are active.
    pub fn active_shops(&self) -> impl Iterator<Item = &Shop> {
        self.shops.iter().filter(|s| s.active)
    }

    /// Returns the ids of the active languages.
    pub fn active_language_ids(&self) -> Vec<i64> {
        self.languages
            .iter()
            .filter(|l| l.active)
            .map(|l| l.id)
            .collect()
    }

    /// Returns a submitted value.
    pub fn value(&self, key: &str) -> Option<&RequestValue> {
        self.values.get(key)
    }

    /// Returns a submitted scalar value as a string.
    pub fn str_value(&self, key: &str) -> Option<&str> {
        self.value(key).and_then(RequestValue::as_str)
    }

    /// Returns a submitted scalar value parsed as an integer.
    pub fn int_value(&self, key: &str) -> Option<i64> {
        self.value(key).and_then(RequestValue::as_int)
    }

    /// Returns `true` if the key was submitted at all.
    pub fn is_submit(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Builds a link back to the admin controller with extra parameters.
    pub fn admin_link(&self, controller: &str, params: &[(&str, String)]) -> String {
        let mut url = format!("{}?controller={controller}", self.admin_url);
        for (key, value) in params {
            url.push('&');
            url.push_str(key);
            url.push('=');
            url.push_str(value);
        }
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RequestContext {
        RequestContext::new(Shop::new(1, "Main"), Language::new(1, "en"))
    }

    #[test]
    fn test_new_defaults_to_single_shop() {
        let ctx = ctx();
        assert!(ctx.is_single_shop());
        assert_eq!(ctx.selected_shop_id(), Some(1));
        assert!(!ctx.multishop_active);
        assert_eq!(ctx.active_language_ids(), vec![1]);
    }

    #[test]
    fn test_group_context() {
        let ctx = ctx().with_shop_context(ShopContext::Group(3));
        assert!(!ctx.is_single_shop());
        assert_eq!(ctx.selected_shop_id(), None);
    }

    #[test]
    fn test_inactive_language_filtered() {
        let mut fr = Language::new(2, "fr");
        fr.active = false;
        let ctx = ctx().with_languages(vec![Language::new(1, "en"), fr, Language::new(3, "de")]);
        assert_eq!(ctx.active_language_ids(), vec![1, 3]);
    }

    #[test]
    fn test_values() {
        let ctx = ctx()
            .with_value("id", "12")
            .with_value("name", "x")
            .with_value("tags", vec!["a", "b"]);
        assert_eq!(ctx.int_value("id"), Some(12));
        assert_eq!(ctx.int_value("name"), None);
        assert_eq!(ctx.str_value("tags"), None);
        assert!(ctx.is_submit("tags"));
        assert!(!ctx.is_submit("missing"));
    }

    #[test]
    fn test_request_value_from_json() {
        let v: RequestValue =
            serde_json::from_value(serde_json::json!([["3", 4], ["5"], true])).unwrap();
        assert_eq!(v.flatten(), vec!["3", "4", "5", "1"]);
        assert!(!v.is_nested_list());

        let nested: RequestValue = serde_json::from_value(serde_json::json!([["3"], ["5"]])).unwrap();
        assert!(nested.is_nested_list());

        let tree: RequestValue =
            serde_json::from_value(serde_json::json!({"b": ["7"], "a": {"x": "6"}})).unwrap();
        assert!(tree.is_nested_list());
        assert_eq!(tree.flatten(), vec!["6", "7"]);
        assert_eq!(tree.as_list(), None);
    }

    #[test]
    fn test_indexed_list_and_map() {
        let list = RequestValue::from(vec!["a", "b"]);
        assert_eq!(
            list.indexed(),
            Some(vec![(0, &RequestValue::from("a")), (1, &RequestValue::from("b"))])
        );

        let map: RequestValue =
            serde_json::from_value(serde_json::json!({"10": "c", "2": "b", "x": "skip", "0": "a"}))
                .unwrap();
        let keys: Vec<i64> = map.indexed().unwrap().into_iter().map(|(i, _)| i).collect();
        assert_eq!(keys, vec![0, 2, 10]);
        assert_eq!(map.indexed().unwrap()[2].1.as_str(), Some("c"));

        assert_eq!(RequestValue::from("a").indexed(), None);
    }

    #[test]
    fn test_admin_link() {
        let ctx = ctx().with_admin_url("/admin/index.php");
        let link = ctx.admin_link("AdminSlides", &[("setShopContext", "s-2".to_string())]);
        assert_eq!(
            link,
            "/admin/index.php?controller=AdminSlides&setShopContext=s-2"
        );
    }
}
