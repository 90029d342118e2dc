//! Multi-shop context handling.
//!
//! Entities shared between shops carry a `<table>_shop` association table.
//! When the multishop feature is on, admin lists join it, and controllers
//! that only make sense for one shop ask the administrator to pick one.

use adminkit_core::{RequestContext, ShopContext};
use adminkit_db::EntityDefinition;
use serde::{Deserialize, Serialize};

/// Builds the join of the entity's shop association table.
///
/// `INNER JOIN` when a single shop is selected (only rows of that shop),
/// `LEFT JOIN` for an all-shops or group context. `None` when the multishop
/// feature is off or the entity has no association table.
pub fn shop_join(def: &EntityDefinition, ctx: &RequestContext) -> Option<String> {
    if !ctx.multishop_active {
        return None;
    }
    let shop_table = def.shop_table.as_ref()?;
    let join_type = match ctx.shop_context {
        ShopContext::Shop(_) => "INNER",
        ShopContext::All | ShopContext::Group(_) => "LEFT",
    };
    Some(format!(
        "{join_type} JOIN {shop_table} shop ON (a.{pk} = shop.{pk} AND shop.id_shop = {id_shop})",
        pk = def.primary,
        id_shop = ctx.shop.id,
    ))
}

/// A link switching the admin session to one shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopLink {
    /// Target shop.
    pub shop_id: i64,
    /// Shop name.
    pub name: String,
    /// Controller URL with `setShopContext=s-<id_shop>`.
    pub url: String,
}

impl ShopLink {
    /// Renders the link as an anchor.
    pub fn to_html(&self) -> String {
        format!(r#"<a href="{}"><b>{}</b></a>"#, self.url, self.name)
    }
}

/// A message shown above a shop-scoped controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShopNotice {
    /// No single shop is selected; the page is not rendered.
    Warning {
        /// Message text, with the shop links as HTML.
        message: String,
        /// One link per active shop.
        links: Vec<ShopLink>,
    },
    /// Names the shop being edited.
    Info {
        /// Message text.
        message: String,
    },
}

/// Links to every active shop of the installation.
pub fn shop_links(ctx: &RequestContext, controller: &str) -> Vec<ShopLink> {
    ctx.active_shops()
        .map(|shop| ShopLink {
            shop_id: shop.id,
            name: shop.name.clone(),
            url: ctx.admin_link(controller, &[("setShopContext", format!("s-{}", shop.id))]),
        })
        .collect()
}

/// Decides what a controller requiring a shop context shows.
///
/// - Multishop on and no single shop selected: a warning with shop links.
/// - No pending action and not ajax: an info naming the current shop, unless
///   the shop is unknown.
/// - Otherwise nothing.
pub fn shop_context_notice(
    ctx: &RequestContext,
    controller: &str,
    action: &str,
) -> Option<ShopNotice> {
    if ctx.multishop_active && !ctx.is_single_shop() {
        let links = shop_links(ctx, controller);
        let html: Vec<String> = links.iter().map(ShopLink::to_html).collect();
        return Some(ShopNotice::Warning {
            message: format!("Select a shop to continue: {}", html.join(", ")),
            links,
        });
    }

    if action.is_empty() && !ctx.ajax {
        let shop = ctx.find_shop(ctx.shop.id)?;
        return Some(ShopNotice::Info {
            message: format!("You are editing shop: <b>{}</b>", shop.name),
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use adminkit_core::{Language, Shop};

    fn ctx() -> RequestContext {
        RequestContext::new(Shop::new(1, "Main"), Language::new(1, "en"))
            .with_shops(vec![Shop::new(1, "Main"), Shop::new(2, "Outlet")])
    }

    fn def() -> EntityDefinition {
        EntityDefinition::new("Slide", "slide", "id_slide").with_multishop()
    }

    #[test]
    fn test_no_join_without_multishop() {
        assert_eq!(shop_join(&def(), &ctx()), None);
    }

    #[test]
    fn test_no_join_without_shop_table() {
        let ctx = ctx().with_multishop(true);
        let def = EntityDefinition::new("Slide", "slide", "id_slide");
        assert_eq!(shop_join(&def, &ctx), None);
    }

    #[test]
    fn test_inner_join_for_single_shop() {
        let ctx = ctx().with_multishop(true);
        assert_eq!(
            shop_join(&def(), &ctx).unwrap(),
            "INNER JOIN slide_shop shop ON (a.id_slide = shop.id_slide AND shop.id_shop = 1)"
        );
    }

    #[test]
    fn test_left_join_for_all_shops() {
        let ctx = ctx()
            .with_multishop(true)
            .with_shop_context(ShopContext::All);
        assert!(shop_join(&def(), &ctx).unwrap().starts_with("LEFT JOIN"));

        let ctx = ctx.with_shop_context(ShopContext::Group(1));
        assert!(shop_join(&def(), &ctx).unwrap().starts_with("LEFT JOIN"));
    }

    #[test]
    fn test_warning_lists_active_shops() {
        let mut closed = Shop::new(3, "Closed");
        closed.active = false;
        let ctx = ctx()
            .with_shops(vec![Shop::new(1, "Main"), Shop::new(2, "Outlet"), closed])
            .with_multishop(true)
            .with_shop_context(ShopContext::All);

        let Some(ShopNotice::Warning { message, links }) =
            shop_context_notice(&ctx, "AdminSlides", "")
        else {
            panic!("expected a warning");
        };
        assert_eq!(links.len(), 2);
        assert_eq!(links[1].url, "index.php?controller=AdminSlides&setShopContext=s-2");
        assert!(message.contains(r#"<a href="index.php?controller=AdminSlides&setShopContext=s-1"><b>Main</b></a>, "#));
    }

    #[test]
    fn test_info_names_current_shop() {
        let notice = shop_context_notice(&ctx(), "AdminSlides", "");
        assert_eq!(
            notice,
            Some(ShopNotice::Info {
                message: "You are editing shop: <b>Main</b>".to_string()
            })
        );
    }

    #[test]
    fn test_no_info_during_action_or_ajax() {
        assert_eq!(shop_context_notice(&ctx(), "AdminSlides", "submitAdd"), None);
        assert_eq!(shop_context_notice(&ctx().with_ajax(true), "AdminSlides", ""), None);
    }

    #[test]
    fn test_no_info_for_unknown_shop() {
        let ctx = ctx().with_shops(vec![Shop::new(2, "Outlet")]);
        assert_eq!(shop_context_notice(&ctx, "AdminSlides", ""), None);
    }
}
