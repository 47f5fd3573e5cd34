//! Policy gate for short-code requests
//!
//! Decides whether fetched bytes are served or the caller is redirected,
//! moderating each short code at most once. Decision order:
//! 1. admin referer -> serve, no writes
//! 2. no usable store -> serve (fail-open)
//! 3. load the record, creating a default one if missing
//! 4. white-listed -> serve
//! 5. blocked or labelled adult -> redirect
//! 6. white-list mode -> redirect
//! 7. unlabelled and moderation configured -> rate, maybe redirect
//! 8. persist, serve
//!
//! The moderation service is given the public short link, so it fetches the
//! image through this gate. While a code is being rated, requests for it are
//! served without a second rating.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use reqwest::Url;
use tracing::{debug, info, warn};

use crate::config::PolicyConfig;
use crate::kv::{load_record, save_record, FileRecord, KvStore, ListType, ADULT_LABEL};
use crate::moderation::ModerationClient;

/// Local page shown when a file is blocked
pub const BLOCK_PAGE: &str = "/block-img.html";

/// Local page shown while white-list mode is on
pub const WHITELIST_PAGE: &str = "/whitelist-on.html";

/// Final outcome for a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Serve,
    /// 302 to the given absolute URL
    Redirect(String),
}

/// What the stored classification alone says
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Block,
    WhitelistRequired,
    Moderate,
}

/// Classify a record without side effects
pub fn classify(record: &FileRecord, whitelist_mode: bool, moderation_enabled: bool) -> Verdict {
    match record.list_type {
        ListType::White => return Verdict::Allow,
        ListType::Block => return Verdict::Block,
        ListType::None | ListType::Unknown => {}
    }

    if record.is_adult() {
        Verdict::Block
    } else if whitelist_mode {
        Verdict::WhitelistRequired
    } else if moderation_enabled && record.label.is_none() {
        Verdict::Moderate
    } else {
        Verdict::Allow
    }
}

/// Check if the referer points into this site's admin UI
///
/// Scheme is ignored so TLS-terminating proxies in front do not matter.
pub fn is_admin_referer(referer: Option<&str>, origin: &str, marker: &str) -> bool {
    let Some(referer) = referer else {
        return false;
    };
    let (Ok(referer), Ok(origin)) = (Url::parse(referer), Url::parse(origin)) else {
        return false;
    };

    referer.host_str() == origin.host_str()
        && referer.port() == origin.port()
        && referer.path().starts_with(marker)
}

/// Request facts the gate needs
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// `scheme://host[:port]` of this service as seen by the caller
    pub origin: String,
    pub referer: Option<String>,
}

impl RequestContext {
    fn page(&self, path: &str) -> String {
        format!("{}{}", self.origin.trim_end_matches('/'), path)
    }

    /// Public short link for `code`
    pub fn short_link(&self, code: &str) -> String {
        self.page(&format!("/s/{}", code))
    }
}

/// Marks a code as being rated until dropped
pub struct RatingClaim<'a> {
    rating: &'a Mutex<HashSet<String>>,
    code: String,
}

impl Drop for RatingClaim<'_> {
    fn drop(&mut self) {
        self.rating.lock().remove(&self.code);
    }
}

/// Allow/block/moderate decision logic with its store side effects
pub struct PolicyGate {
    store: Option<Arc<dyn KvStore>>,
    moderation: Arc<ModerationClient>,
    policy: PolicyConfig,
    rating: Mutex<HashSet<String>>,
}

impl PolicyGate {
    /// Create a new gate
    pub fn new(
        store: Option<Arc<dyn KvStore>>,
        moderation: Arc<ModerationClient>,
        policy: PolicyConfig,
    ) -> Self {
        Self {
            store,
            moderation,
            policy,
            rating: Mutex::new(HashSet::new()),
        }
    }

    /// Claim `code` for rating; None while another request is rating it
    pub fn claim_rating(&self, code: &str) -> Option<RatingClaim<'_>> {
        if !self.rating.lock().insert(code.to_string()) {
            return None;
        }
        Some(RatingClaim {
            rating: &self.rating,
            code: code.to_string(),
        })
    }

    /// Decide the response for a successfully fetched short code
    pub async fn decide(&self, code: &str, ctx: &RequestContext) -> Decision {
        if is_admin_referer(
            ctx.referer.as_deref(),
            &ctx.origin,
            &self.policy.admin_path_marker,
        ) {
            debug!("Admin referer for {}, serving directly", code);
            return Decision::Serve;
        }

        let Some(store) = self.store.as_deref() else {
            debug!("Metadata store not available, serving {} directly", code);
            return Decision::Serve;
        };

        let mut record = match load_record(store, code).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                info!("Metadata for {} not found, initializing", code);
                let record = FileRecord::new(Some(code.to_string()), 0);
                self.persist(store, code, &record).await;
                record
            }
            Err(e) => {
                warn!("Failed to read metadata for {}, serving directly: {}", code, e);
                return Decision::Serve;
            }
        };

        match classify(
            &record,
            self.policy.whitelist_mode,
            self.moderation.is_configured(),
        ) {
            Verdict::Allow => {}
            Verdict::Block => {
                info!("Blocked request for {}", code);
                let target = if ctx.referer.is_some() {
                    self.policy.blocked_image_url.clone()
                } else {
                    ctx.page(BLOCK_PAGE)
                };
                return Decision::Redirect(target);
            }
            Verdict::WhitelistRequired => {
                return Decision::Redirect(ctx.page(WHITELIST_PAGE));
            }
            Verdict::Moderate => {
                // The moderation service fetching the link lands here
                let Some(_claim) = self.claim_rating(code) else {
                    debug!("Rating of {} in progress, serving directly", code);
                    return Decision::Serve;
                };

                match self.moderation.rate(&ctx.short_link(code)).await {
                    Ok(Some(label)) => {
                        info!("Moderation rated {} as {}", code, label);
                        let adult = label == ADULT_LABEL;
                        record.label = Some(label);
                        if adult {
                            self.persist(store, code, &record).await;
                            return Decision::Redirect(ctx.page(BLOCK_PAGE));
                        }
                    }
                    Ok(None) => warn!("Moderation returned no label for {}", code),
                    Err(e) => warn!("Content moderation failed for {}: {}", code, e),
                }
            }
        }

        self.persist(store, code, &record).await;
        Decision::Serve
    }

    async fn persist(&self, store: &dyn KvStore, code: &str, record: &FileRecord) {
        if let Err(e) = save_record(store, code, record).await {
            warn!("Failed to save metadata for {}: {}", code, e);
        }
    }
}
