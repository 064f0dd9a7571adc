use super::{set_timestamps, wait_options, wait_status, zoned_id, zoned_ref};
use crate::error::Result;
use crate::meta::Meta;
use crate::resource::{Resource, ResourceData};
use async_trait::async_trait;
use scw_api::lb::{
    CERT_STATUS_ERROR, CreateCertificateRequest, CustomCertificateConfig, LetsEncryptConfig,
};
use scw_core::convert::{expand_string, expand_strings, flatten_strings, flatten_time};
use scw_core::diff::suppress_locality;
use scw_core::waiter::SLOW_RETRY_INTERVAL;
use scw_core::{
    Attribute, Block, Context, Diagnostic, Diagnostics, Object, Schema, Type, Value, ZonedId,
};

pub struct LbCertificate;

const CERT_WAIT_STATUSES: &[&str] = &["ready", CERT_STATUS_ERROR];

fn letsencrypt_block() -> Block {
    Block::new()
        .attr("common_name", Attribute::required(Type::String))
        .attr(
            "subject_alternative_name",
            Attribute::optional(Type::list(Type::String)),
        )
}

fn custom_block() -> Block {
    Block::new().attr(
        "certificate_chain",
        Attribute::required(Type::String)
            .sensitive()
            .description("PEM chain: certificate, intermediates, then private key"),
    )
}

/// Attribute responsible for the certificate, for diagnostics
fn source_attribute(d: &ResourceData) -> &'static str {
    if d.get("custom_certificate").is_empty() {
        "letsencrypt"
    } else {
        "custom_certificate"
    }
}

fn expand_request(d: &ResourceData) -> CreateCertificateRequest {
    let letsencrypt = d
        .get("letsencrypt")
        .as_items()
        .first()
        .map(|le| LetsEncryptConfig {
            common_name: expand_string(le.get("common_name")),
            subject_alternative_name: expand_strings(le.get("subject_alternative_name")),
        });
    let custom_certificate = d
        .get("custom_certificate")
        .as_items()
        .first()
        .map(|c| CustomCertificateConfig {
            certificate_chain: expand_string(c.get("certificate_chain")),
        });
    CreateCertificateRequest {
        name: expand_string(d.get("name")),
        letsencrypt,
        custom_certificate,
    }
}

#[async_trait]
impl Resource for LbCertificate {
    fn type_name(&self) -> &'static str {
        "scaleway_lb_certificate"
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
                    "letsencrypt",
                    Attribute::optional(Type::list(Type::Object(letsencrypt_block())))
                        .max_items(1)
                        .force_new()
                        .conflicts_with(&["custom_certificate"]),
                )
                .attr(
                    "custom_certificate",
                    Attribute::optional(Type::list(Type::Object(custom_block())))
                        .max_items(1)
                        .force_new()
                        .conflicts_with(&["letsencrypt"]),
                )
                .attr("common_name", Attribute::computed(Type::String))
                .attr(
                    "subject_alternative_name",
                    Attribute::computed(Type::list(Type::String)),
                )
                .attr("fingerprint", Attribute::computed(Type::String))
                .attr("not_valid_before", Attribute::computed(Type::Time))
                .attr("not_valid_after", Attribute::computed(Type::Time))
                .attr("status", Attribute::computed(Type::String))
                .attr("created_at", Attribute::computed(Type::Time))
                .attr("updated_at", Attribute::computed(Type::Time)),
        )
        .description("Load balancer TLS certificate")
    }

    fn validate(&self, config: &Object) -> Diagnostics {
        let set = |name: &str| config.get(name).is_some_and(|v| !v.is_empty());
        if set("letsencrypt") || set("custom_certificate") {
            return Diagnostics::new();
        }
        Diagnostic::error("Missing certificate source")
            .with_detail("one of \"letsencrypt\" or \"custom_certificate\" must be set")
            .with_path("letsencrypt")
            .into()
    }

    async fn create(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let lb = zoned_ref(meta, d, "lb_id")?;
        let req = expand_request(d);
        let cert = meta
            .lb()
            .create_certificate(ctx, &lb.zone, &lb.id, &req)
            .await?;
        d.set_id(ZonedId::new(lb.zone.clone(), &cert.id));

        let opts = wait_options(d, SLOW_RETRY_INTERVAL);
        wait_status(
            ctx,
            &format!("certificate {}", cert.id),
            opts,
            CERT_WAIT_STATUSES,
            || meta.lb().get_certificate(ctx, &lb.zone, &cert.id),
        )
        .await?;
        Ok(())
    }

    async fn read(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let ZonedId { zone, id } = zoned_id(d)?;
        let cert = meta.lb().get_certificate(ctx, &zone, &id).await?;

        d.set("lb_id", ZonedId::new(zone.clone(), &cert.lb_id).to_string());
        d.set("name", cert.name.as_str());
        d.set("common_name", cert.common_name.as_str());
        d.set(
            "subject_alternative_name",
            flatten_strings(&cert.subject_alternative_name),
        );
        d.set("fingerprint", cert.fingerprint.as_str());
        d.set("not_valid_before", flatten_time(cert.not_valid_before.as_ref()));
        d.set("not_valid_after", flatten_time(cert.not_valid_after.as_ref()));
        d.set("status", cert.status.as_str());
        if !d.get("letsencrypt").is_empty() {
            let mut le = Object::new();
            le.insert("common_name".to_string(), Value::from(cert.common_name.as_str()));
            le.insert(
                "subject_alternative_name".to_string(),
                flatten_strings(&cert.subject_alternative_name),
            );
            d.set("letsencrypt", Value::List(vec![Value::Object(le)]));
        }
        set_timestamps(d, cert.created_at.as_ref(), cert.updated_at.as_ref());

        if cert.status == CERT_STATUS_ERROR {
            let attr = source_attribute(d);
            d.warn(
                Diagnostic::warning("Certificate is in error state")
                    .with_detail(
                        cert.status_details
                            .unwrap_or_else(|| "no details given by the API".to_string()),
                    )
                    .with_path(attr),
            );
        }
        Ok(())
    }

    async fn update(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        if d.has_change("name") {
            let ZonedId { zone, id } = zoned_id(d)?;
            meta.lb()
                .update_certificate(ctx, &zone, &id, d.get_str("name"))
                .await?;
        }
        Ok(())
    }

    async fn delete(&self, ctx: &Context, meta: &Meta, d: &mut ResourceData) -> Result<()> {
        let ZonedId { zone, id } = zoned_id(d)?;
        meta.lb().delete_certificate(ctx, &zone, &id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scw_core::object;

    #[test]
    fn test_request_from_letsencrypt() {
        let d = ResourceData::new(
            None,
            object! {
                "name" => "web",
                "letsencrypt" => Value::List(vec![Value::Object(object! {
                    "common_name" => "example.com",
                    "subject_alternative_name" => Value::string_list(["www.example.com"]),
                })]),
            },
        );
        let req = expand_request(&d);
        let le = req.letsencrypt.unwrap();
        assert_eq!(le.common_name, "example.com");
        assert_eq!(le.subject_alternative_name, vec!["www.example.com"]);
        assert!(req.custom_certificate.is_none());
        assert_eq!(source_attribute(&d), "letsencrypt");
    }

    #[test]
    fn test_source_required() {
        assert!(LbCertificate.validate(&object! { "name" => "web" }).has_errors());
    }
}
