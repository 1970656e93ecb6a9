//! Instance Resolver - the routing cascade.
//!
//! Decides which tenant serves an operation, first match wins:
//! 1. explicit instance override
//! 2. space key bound in the space-route table
//! 3. space key listed in some instance's known spaces
//! 4. configured default instance
//! 5. the only configured instance
//! 6. ambiguous - fail with the list of candidates
//!
//! With a page id and no space context, the page-instance cache is
//! consulted before falling through to steps 4-6.

use std::sync::Arc;

use tracing::debug;

use wikimux_core::{InstanceConfig, RoutingError};

use super::page_cache::PageInstanceCache;
use super::InstanceRegistry;

/// A routing decision: which tenant serves the operation.
#[derive(Debug, Clone)]
pub struct ResolvedInstance {
    pub instance_name: String,
    pub config: InstanceConfig,
}

/// Resolution service over registry snapshots.
pub struct InstanceResolver {
    registry: Arc<InstanceRegistry>,
    page_cache: Arc<PageInstanceCache>,
}

impl InstanceResolver {
    pub fn new(registry: Arc<InstanceRegistry>, page_cache: Arc<PageInstanceCache>) -> Self {
        Self {
            registry,
            page_cache,
        }
    }

    /// Resolve the tenant for an operation's context.
    ///
    /// Read-only and idempotent for a fixed context while the
    /// configuration is unchanged. On known-space ties the first instance
    /// in configuration document order wins; that order is not stable
    /// across reconfiguration.
    pub fn resolve(
        &self,
        explicit_instance: Option<&str>,
        space_key: Option<&str>,
        page_id: Option<&str>,
    ) -> Result<ResolvedInstance, RoutingError> {
        let state = self.registry.snapshot()?;

        // 1. Explicit override
        if let Some(name) = explicit_instance {
            return match state.instance(name) {
                Some(config) => Ok(ResolvedInstance {
                    instance_name: name.to_string(),
                    config: config.clone(),
                }),
                None => Err(RoutingError::InstanceNotFound {
                    name: name.to_string(),
                    available: state.instance_names(),
                }),
            };
        }

        if let Some(key) = space_key {
            // 2. Space route table. A dangling binding is a configuration
            // error, surfaced rather than silently skipped.
            if let Some(route) = state.space_route(key) {
                return match state.instance(&route.instance_name) {
                    Some(config) => {
                        debug!(
                            space_key = %key,
                            instance = %route.instance_name,
                            "[InstanceResolver] Routed via space route"
                        );
                        Ok(ResolvedInstance {
                            instance_name: route.instance_name.clone(),
                            config: config.clone(),
                        })
                    }
                    None => Err(RoutingError::InstanceNotFound {
                        name: route.instance_name.clone(),
                        available: state.instance_names(),
                    }),
                };
            }

            // 3. Known spaces, registry iteration order.
            if let Some((name, config)) = state.instances().find(|(_, c)| c.serves_space(key)) {
                debug!(
                    space_key = %key,
                    instance = %name,
                    "[InstanceResolver] Routed via known spaces"
                );
                return Ok(ResolvedInstance {
                    instance_name: name.to_string(),
                    config: config.clone(),
                });
            }
        } else if let Some(page_id) = page_id {
            // No space context: the page cache remembers who served this
            // page. A miss falls through to the tail of the cascade.
            if let Some(hit) = self.page_cache.get(page_id, &state) {
                if let Some(config) = state.instance(&hit.instance_name) {
                    debug!(
                        page_id = %page_id,
                        instance = %hit.instance_name,
                        "[InstanceResolver] Routed via page cache"
                    );
                    return Ok(ResolvedInstance {
                        instance_name: hit.instance_name,
                        config: config.clone(),
                    });
                }
            }
        }

        // 4. Default instance
        if let Some(name) = state.default_instance() {
            return match state.instance(name) {
                Some(config) => Ok(ResolvedInstance {
                    instance_name: name.to_string(),
                    config: config.clone(),
                }),
                None => Err(RoutingError::InstanceNotFound {
                    name: name.to_string(),
                    available: state.instance_names(),
                }),
            };
        }

        // 5. Exactly one instance configured
        if state.len() == 1 {
            if let Some((name, config)) = state.instances().next() {
                return Ok(ResolvedInstance {
                    instance_name: name.to_string(),
                    config: config.clone(),
                });
            }
        }

        // 6. Nothing decides - the caller must disambiguate.
        Err(RoutingError::AmbiguousInstance {
            available: state.instance_names(),
        })
    }
}
