use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_route53::types::{
    Change, ChangeAction as Route53Action, ChangeBatch, ResourceRecord, ResourceRecordSet, RrType,
};
use aws_sdk_route53::Client as Route53Client;

use crate::cloud::{ChangeAction, Dns, HostedZone, RecordSet, RecordType};
use crate::error::format_sdk_error;

pub struct Route53Dns {
    client: Route53Client,
}

impl Route53Dns {
    pub fn new(client: Route53Client) -> Self {
        Self { client }
    }
}

fn sdk_type(record_type: RecordType) -> RrType {
    match record_type {
        RecordType::Cname => RrType::Cname,
    }
}

/// Route53 returns zone ids as `/hostedzone/Z123`; the API accepts the bare id
fn normalize_zone_id(id: &str) -> String {
    id.rsplit('/').next().unwrap_or(id).to_string()
}

#[async_trait]
impl Dns for Route53Dns {
    async fn list_hosted_zones_by_name(&self, dns_name: &str) -> Result<Vec<HostedZone>> {
        let resp = self
            .client
            .list_hosted_zones_by_name()
            .dns_name(dns_name)
            .max_items(1)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!(format_sdk_error(&e)))
            .context("Failed to list hosted zones")?;

        Ok(resp
            .hosted_zones()
            .iter()
            .map(|zone| HostedZone {
                id: normalize_zone_id(zone.id()),
                name: zone.name().to_string(),
            })
            .collect())
    }

    async fn list_record_sets(
        &self,
        zone_id: &str,
        name: &str,
        record_type: RecordType,
        max_items: i32,
    ) -> Result<Vec<RecordSet>> {
        let resp = self
            .client
            .list_resource_record_sets()
            .hosted_zone_id(zone_id)
            .start_record_name(name)
            .start_record_type(sdk_type(record_type))
            .max_items(max_items)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!(format_sdk_error(&e)))
            .context("Failed to list records")?;

        // Only CNAMEs are managed here; anything else at that position is
        // reported as "no record"
        Ok(resp
            .resource_record_sets()
            .iter()
            .filter(|rs| *rs.r#type() == RrType::Cname)
            .map(|rs| RecordSet {
                name: rs.name().to_string(),
                record_type: RecordType::Cname,
                ttl: rs.ttl(),
                values: rs
                    .resource_records()
                    .iter()
                    .map(|r| r.value().to_string())
                    .collect(),
            })
            .collect())
    }

    async fn change_record_set(
        &self,
        zone_id: &str,
        action: ChangeAction,
        record: &RecordSet,
    ) -> Result<()> {
        let mut records = Vec::with_capacity(record.values.len());
        for value in &record.values {
            records.push(ResourceRecord::builder().value(value).build()?);
        }

        let record_set = ResourceRecordSet::builder()
            .name(&record.name)
            .r#type(sdk_type(record.record_type))
            .set_ttl(record.ttl)
            .set_resource_records(Some(records))
            .build()?;

        let action = match action {
            ChangeAction::Upsert => Route53Action::Upsert,
            ChangeAction::Delete => Route53Action::Delete,
        };

        let batch = ChangeBatch::builder()
            .changes(
                Change::builder()
                    .action(action)
                    .resource_record_set(record_set)
                    .build()?,
            )
            .build()?;

        self.client
            .change_resource_record_sets()
            .hosted_zone_id(zone_id)
            .change_batch(batch)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!(format_sdk_error(&e)))
            .with_context(|| format!("Failed to change record {}", record.name))?;

        Ok(())
    }
}
