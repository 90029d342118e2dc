//! Module descriptors.
//!
//! A [`Module`] describes an installable admin module: its technical name,
//! the version shipped in the code, and the back-office tab it is listed
//! under. The version recorded at install time lives in the host's `module`
//! table; comparing the two tells whether an upgrade is pending.

use std::fmt;
use std::str::FromStr;

use adminkit_core::version::is_older;
use adminkit_core::{AdminKitError, AdminKitResult};
use adminkit_db::{DbExecutor, Value};
use serde::{Deserialize, Serialize};

/// The back-office tab a module is listed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleCategory {
    Administration,
    AdvertisingMarketing,
    AnalyticsStats,
    BillingInvoicing,
    Checkout,
    ContentManagement,
    Dashboard,
    Emailing,
    Export,
    FrontOfficeFeatures,
    I18nLocalization,
    MarketPlace,
    Merchandizing,
    MigrationTools,
    Mobile,
    Others,
    PaymentsGateways,
    PaymentSecurity,
    PricingPromotion,
    QuickBulkUpdate,
    SearchFilter,
    Seo,
    ShippingLogistics,
    Slideshows,
    SmartShopping,
    SocialNetworks,
}

impl ModuleCategory {
    /// Every category, in tab order.
    pub const ALL: [Self; 26] = [
        Self::Administration,
        Self::AdvertisingMarketing,
        Self::AnalyticsStats,
        Self::BillingInvoicing,
        Self::Checkout,
        Self::ContentManagement,
        Self::Dashboard,
        Self::Emailing,
        Self::Export,
        Self::FrontOfficeFeatures,
        Self::I18nLocalization,
        Self::MarketPlace,
        Self::Merchandizing,
        Self::MigrationTools,
        Self::Mobile,
        Self::Others,
        Self::PaymentsGateways,
        Self::PaymentSecurity,
        Self::PricingPromotion,
        Self::QuickBulkUpdate,
        Self::SearchFilter,
        Self::Seo,
        Self::ShippingLogistics,
        Self::Slideshows,
        Self::SmartShopping,
        Self::SocialNetworks,
    ];

    /// The tab identifier.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Administration => "administration",
            Self::AdvertisingMarketing => "advertising_marketing",
            Self::AnalyticsStats => "analytics_stats",
            Self::BillingInvoicing => "billing_invoicing",
            Self::Checkout => "checkout",
            Self::ContentManagement => "content_management",
            Self::Dashboard => "dashboard",
            Self::Emailing => "emailing",
            Self::Export => "export",
            Self::FrontOfficeFeatures => "front_office_features",
            Self::I18nLocalization => "i18n_localization",
            Self::MarketPlace => "market_place",
            Self::Merchandizing => "merchandizing",
            Self::MigrationTools => "migration_tools",
            Self::Mobile => "mobile",
            Self::Others => "others",
            Self::PaymentsGateways => "payments_gateways",
            Self::PaymentSecurity => "payment_security",
            Self::PricingPromotion => "pricing_promotion",
            Self::QuickBulkUpdate => "quick_bulk_update",
            Self::SearchFilter => "search_filter",
            Self::Seo => "seo",
            Self::ShippingLogistics => "shipping_logistics",
            Self::Slideshows => "slideshows",
            Self::SmartShopping => "smart_shopping",
            Self::SocialNetworks => "social_networks",
        }
    }
}

impl fmt::Display for ModuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleCategory {
    type Err = AdminKitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| AdminKitError::BadRequest(format!("Unknown module category '{s}'")))
    }
}

/// An installable module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    /// Technical name, the key of the `module` table.
    pub name: String,
    /// Human-readable name.
    pub display_name: String,
    /// Version shipped in the code.
    pub version: String,
    /// Back-office tab.
    pub category: ModuleCategory,
    /// Author shown in the module list.
    #[serde(default)]
    pub author: String,
    /// Prefix of the host's tables.
    #[serde(default)]
    pub table_prefix: String,
}

impl Module {
    /// Creates a module descriptor.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        category: ModuleCategory,
    ) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            version: version.into(),
            category,
            author: String::new(),
            table_prefix: String::new(),
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Sets the author.
    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Sets the host table prefix.
    #[must_use]
    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    /// The version recorded when the module was installed, `None` when the
    /// module is not installed or the version is blank.
    pub async fn database_version(&self, db: &dyn DbExecutor) -> AdminKitResult<Option<String>> {
        let rows = db
            .query(
                &format!("SELECT version FROM {}module WHERE name = ?", self.table_prefix),
                &[Value::from(self.name.as_str())],
            )
            .await?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let version = row.get::<Option<String>>("version")?;
        Ok(version.filter(|v| !is_blank(v)))
    }

    /// Returns `true` when the installed version is older than the shipped
    /// one. Blank versions on either side never upgrade.
    pub async fn can_be_upgraded(&self, db: &dyn DbExecutor) -> AdminKitResult<bool> {
        if is_blank(&self.version) {
            return Ok(false);
        }
        let Some(installed) = self.database_version(db).await? else {
            return Ok(false);
        };
        let upgradable = is_older(&installed, &self.version);
        tracing::debug!(module = %self.name, %installed, shipped = %self.version, upgradable);
        Ok(upgradable)
    }
}

/// Empty, whitespace or `"0"`.
fn is_blank(version: &str) -> bool {
    let v = version.trim();
    v.is_empty() || v == "0"
}
