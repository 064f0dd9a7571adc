use super::{set_timestamps, zoned_id, zoned_ref};
use crate::error::{ProviderError, Result};
use crate::meta::Meta;
use crate::resource::{Resource, ResourceData};
use async_trait::async_trait;
use scw_api::lb::{Backend, BackendSpec, HealthCheck, HttpHealthCheck};
use scw_core::convert::{
    expand_duration_ptr, expand_int_ptr, expand_string, expand_strings, flatten_duration,
    flatten_strings,
};
use scw_core::diff::{suppress_duration, suppress_locality};
use scw_core::{Attribute, Block, Context, Object, Schema, Type, Value, ZonedId};
use std::time::Duration;

pub struct LbBackend;

const PROXY_PREFIX: &str = "proxy_protocol_";
const PROXY_PROTOCOLS: &[&str] = &["none", "v1", "v2", "v2_ssl", "v2_ssl_cn"];

const HEALTH_CHECK_ATTRS: &[&str] = &[
    "health_check_port",
    "health_check_delay",
    "health_check_timeout",
    "health_check_max_retries",
    "health_check_send_proxy",
    "health_check_http",
];

/// The single proxy protocol value sent to the API
///
/// `proxy_protocol` wins unless only the deprecated `send_proxy_v2` was
/// touched by this change.
fn proxy_protocol(d: &ResourceData) -> String {
    let pp = d.get_str("proxy_protocol");
    let legacy_only = d.has_change("send_proxy_v2") && !d.has_change("proxy_protocol");
    if pp.is_empty() || legacy_only {
        let v = if d.get_bool("send_proxy_v2") { "v2" } else { "none" };
        return format!("{PROXY_PREFIX}{v}");
    }
    format!("{PROXY_PREFIX}{pp}")
}

fn flatten_proxy_protocol(api: &str) -> &str {
    match api.strip_prefix(PROXY_PREFIX).unwrap_or(api) {
        "" => "none",
        pp => pp,
    }
}

fn duration(d: &ResourceData, name: &str) -> Result<Option<Duration>> {
    expand_duration_ptr(d.get(name)).map_err(|e| ProviderError::at(name, e))
}

fn int(d: &ResourceData, name: &str) -> Result<Option<i32>> {
    expand_int_ptr(d.get(name))
        .map(i32::try_from)
        .transpose()
        .map_err(|_| ProviderError::invalid(name, "value out of range"))
}

fn expand_health_check(d: &ResourceData) -> Result<HealthCheck> {
    let forward_port = int(d, "forward_port")?.unwrap_or_default();
    let http_config = d.get("health_check_http").as_items().first().map(|h| {
        let method = expand_string(h.get("method"));
        HttpHealthCheck {
            uri: expand_string(h.get("uri")),
            method: if method.is_empty() { "GET".to_string() } else { method },
            code: Some(
                expand_int_ptr(h.get("code"))
                    .and_then(|c| i32::try_from(c).ok())
                    .unwrap_or(200),
            ),
        }
    });
    Ok(HealthCheck {
        port: int(d, "health_check_port")?.unwrap_or(forward_port),
        check_delay: duration(d, "health_check_delay")?,
        check_timeout: duration(d, "health_check_timeout")?,
        check_max_retries: int(d, "health_check_max_retries")?.unwrap_or(2),
        check_send_proxy: d.get_bool("health_check_send_proxy"),
        http_config,
    })
}

fn expand_spec(d: &ResourceData) -> Result<BackendSpec> {
    Ok(BackendSpec {
        name: expand_string(d.get("name")),
        forward_protocol: expand_string(d.get("forward_protocol")),
        forward_port: int(d, "forward_port")?.unwrap_or_default(),
        forward_port_algorithm: expand_string(d.get("forward_port_algorithm")),
        sticky_sessions: expand_string(d.get("sticky_sessions")),
        sticky_sessions_cookie_name: expand_string(d.get("sticky_sessions_cookie_name")),
        server_ip: expand_strings(d.get("server_ips")),
        timeout_server: duration(d, "timeout_server")?,
        timeout_connect: duration(d, "timeout_connect")?,
        timeout_tunnel: duration(d, "timeout_tunnel")?,
        on_marked_down_action: expand_string(d.get("on_marked_down_action")),
        proxy_protocol: proxy_protocol(d),
        health_check: None,
    })
}

fn flatten_backend(d: &mut ResourceData, zone: &ZonedId, b: &Backend) {
    d.set("lb_id", ZonedId::new(zone.zone.clone(), &b.lb_id).to_string());
    d.set("name", b.name.as_str());
    d.set("forward_protocol", b.forward_protocol.as_str());
    d.set("forward_port", i64::from(b.forward_port));
    d.set("forward_port_algorithm", b.forward_port_algorithm.as_str());
    d.set("sticky_sessions", b.sticky_sessions.as_str());
    d.set("sticky_sessions_cookie_name", b.sticky_sessions_cookie_name.as_str());
    d.set("server_ips", flatten_strings(&b.server_ip));
    d.set("timeout_server", flatten_duration(b.timeout_server));
    d.set("timeout_connect", flatten_duration(b.timeout_connect));
    d.set("timeout_tunnel", flatten_duration(b.timeout_tunnel));
    d.set("on_marked_down_action", b.on_marked_down_action.as_str());
    d.set("proxy_protocol", flatten_proxy_protocol(&b.proxy_protocol));
    d.set("send_proxy_v2", b.proxy_protocol == format!("{PROXY_PREFIX}v2"));

    let hc = &b.health_check;
    d.set("health_check_port", i64::from(hc.port));
    d.set("health_check_delay", flatten_duration(hc.check_delay));
    d.set("health_check_timeout", flatten_duration(hc.check_timeout));
    d.set("health_check_max_retries", i64::from(hc.check_max_retries));
    d.set("health_check_send_proxy", hc.check_send_proxy);
    let http = match &hc.http_config {
        Some(h) => {
            let mut o = Object::new();
            o.insert("uri".to_string(), Value::from(h.uri.as_str()));
            o.insert("method".to_string(), Value::from(h.method.as_str()));
            o.insert(
                "code".to_string(),
                Value::Int(i64::from(h.code.unwrap_or_default())),
            );
            Value::List(vec![Value::Object(o)])
        }
        None => Value::List(Vec::new()),
    };
    d.set("health_check_http", http);
    set_timestamps(d, b.created_at.as_ref(), b.updated_at.as_ref());
}

fn http_block() -> Block {
    Block::new()
        .attr("uri", Attribute::required(Type::String))
        .attr(
            "method",
            Attribute::optional_computed(Type::String).description("Defaults to GET"),
        )
        .attr(
            "code",
            Attribute::optional_computed(Type::Int).description("Defaults to 200"),
        )
}

fn timeout_attr() -> Attribute {
    Attribute::optional_computed(Type::Duration).diff_suppress(suppress_duration)
}

#[async_trait]
impl Resource for LbBackend {
    fn type_name(&self) -> &'static str {
        "scaleway_lb_backend"
    }

    fn schema(&self) -> Schema {
        Schema::new(
            Block::new()
                .attr(
                    "lb_id",
                    Attribute::required(Type::String)
                        .force_new()
                        .diff_suppress(suppress_locality),
                )
                .attr("name", Attribute::optional_computed(Type::String))
                .attr(
                    "forward_protocol",
                    Attribute::required(Type::String).one_of(&["tcp", "http"]),
                )
                .attr("forward_port", Attribute::required(Type::Int))
                .attr(
                    "forward_port_algorithm",
                    Attribute::optional(Type::String)
                        .default("roundrobin")
                        .one_of(&["roundrobin", "leastconn", "first"]),
                )
                .attr(
                    "sticky_sessions",
                    Attribute::optional(Type::String)
                        .default("none")
                        .one_of(&["none", "cookie", "table"]),
                )
                .attr(
                    "sticky_sessions_cookie_name",
                    Attribute::optional(Type::String),
                )
                .attr("server_ips", Attribute::optional(Type::list(Type::Ip)))
                .attr("timeout_server", timeout_attr())
                .attr("timeout_connect", timeout_attr())
                .attr("timeout_tunnel", timeout_attr())
                .attr(
                    "on_marked_down_action",
                    Attribute::optional(Type::String)
                        .default("none")
                        .one_of(&["none", "shutdown_sessions"]),
                )
                .attr(
                    "proxy_protocol",
                    Attribute::optional_computed(Type::String).one_of(PROXY_PROTOCOLS),
                )
                .attr(
                    "send_proxy_v2",
                    Attribute::optional_computed(Type::Bool)
                        .deprecated("use proxy_protocol instead"),
                )
                .attr(
                    "health_check_port",
                    Attribute::optional_computed(Type::Int)
                        .description("Defaults to forward_port"),
                )
                .attr(
                    "health_check_delay",
                    Attribute::optional(Type::Duration)
                        .default("60s")
                        .diff_suppress(suppress_duration),
                )
                .attr(
                    "health_check_timeout",
                    Attribute::optional(Type::Duration)
                        .default("30s")
                        .diff_suppress(suppress_duration),
                )
                .attr(
                    "health_check_max_retries",
                    Attribute::optional(Type::Int).default(2i64),
                )
                .attr(
                    "health_check_send_proxy",
                    Attribute::optional(Type::Bool).default(false),
                )
                .attr(
                    "health_check_http",
                    Attribute::optional(Type::list(Type::Object(http_block()))).max_items(1),
                )
                .attr("created_at", Attribute::computed(Type::Time))
                .attr("updated_at", Attribute::computed(Type::Time)),
        )
        .description("Load balancer backend")
    }

    async fn create(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let lb = zoned_ref(meta, d, "lb_id")?;
        let mut spec = expand_spec(d)?;
        spec.health_check = Some(expand_health_check(d)?);
        let backend = meta
            .lb()
            .create_backend(ctx, &lb.zone, &lb.id, &spec)
            .await?;
        d.set_id(ZonedId::new(lb.zone, &backend.id));
        Ok(())
    }

    async fn read(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let id = zoned_id(d)?;
        let backend = meta.lb().get_backend(ctx, &id.zone, &id.id).await?;
        flatten_backend(d, &id, &backend);
        Ok(())
    }

    async fn update(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let ZonedId { zone, id } = zoned_id(d)?;
        let changed_hc = d.has_any_change(HEALTH_CHECK_ATTRS);
        let rest: Vec<&str> = d
            .changes()
            .names()
            .filter(|n| !HEALTH_CHECK_ATTRS.contains(n))
            .collect();
        if !rest.is_empty() {
            tracing::debug!(backend = %id, changed = ?rest, "updating backend");
            let spec = expand_spec(d)?;
            meta.lb().update_backend(ctx, &zone, &id, &spec).await?;
        }
        if changed_hc {
            let hc = expand_health_check(d)?;
            meta.lb().update_health_check(ctx, &zone, &id, &hc).await?;
        }
        Ok(())
    }

    async fn delete(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let ZonedId { zone, id } = zoned_id(d)?;
        meta.lb().delete_backend(ctx, &zone, &id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scw_core::{Change, ChangeSet, object};

    fn data(state: Object, changed: &[&str]) -> ResourceData {
        let mut changes = ChangeSet::new();
        for name in changed {
            changes.insert(
                *name,
                Change {
                    old: Value::Null,
                    new: state.get(*name).cloned().unwrap_or(Value::Null),
                },
            );
        }
        ResourceData::new(None, state).with_changes(changes)
    }

    #[test]
    fn test_proxy_protocol_wins() {
        let d = data(
            object! { "proxy_protocol" => "v1", "send_proxy_v2" => true },
            &["proxy_protocol", "send_proxy_v2"],
        );
        assert_eq!(proxy_protocol(&d), "proxy_protocol_v1");
    }

    #[test]
    fn test_legacy_flag_alone() {
        let d = data(
            object! { "proxy_protocol" => "none", "send_proxy_v2" => true },
            &["send_proxy_v2"],
        );
        assert_eq!(proxy_protocol(&d), "proxy_protocol_v2");

        let unset = data(object! {}, &[]);
        assert_eq!(proxy_protocol(&unset), "proxy_protocol_none");
    }

    #[test]
    fn test_flatten_proxy_protocol() {
        assert_eq!(flatten_proxy_protocol("proxy_protocol_v2_ssl"), "v2_ssl");
        assert_eq!(flatten_proxy_protocol(""), "none");
    }

    #[test]
    fn test_health_check_port_defaults_to_forward_port() {
        let d = data(
            object! {
                "forward_port" => 8080i64,
                "health_check_delay" => "1m",
                "health_check_http" => Value::List(vec![Value::Object(object! { "uri" => "/health" })]),
            },
            &[],
        );
        let hc = expand_health_check(&d).unwrap();
        assert_eq!(hc.port, 8080);
        assert_eq!(hc.check_delay, Some(Duration::from_secs(60)));
        assert_eq!(hc.check_max_retries, 2);
        let http = hc.http_config.unwrap();
        assert_eq!(http.method, "GET");
        assert_eq!(http.code, Some(200));
    }
}
