//! Isolated network provisioning.
//!
//! Validates the address block locally, then creates a VPC with DNS
//! resolution and derived public/private subnets spread across availability
//! zones. Subdivisions are always computed from the parent block; callers
//! never specify them. Provider failures are fatal and surface unchanged;
//! there is no partial network state to reconcile.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::client::AwsApi;
use crate::error::ProvisionError;
use crate::models::{Subnet, Tag};

/// Load-balancer role tag carried by public subnets.
pub const PUBLIC_SUBNET_TAG: &str = "kubernetes.io/role/elb";

/// Load-balancer role tag carried by private subnets.
pub const PRIVATE_SUBNET_TAG: &str = "kubernetes.io/role/internal-elb";

/// Zones the block is spread across, at most.
const MAX_ZONES: usize = 3;

/// Stable handle to a provisioned network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkHandle {
    /// VPC ID.
    pub vpc_id: String,
    /// Address block.
    pub cidr: String,
    /// Public subnet IDs.
    pub public_subnet_ids: Vec<String>,
    /// Private subnet IDs.
    pub private_subnet_ids: Vec<String>,
}

impl NetworkHandle {
    /// All subnet IDs, public first.
    #[must_use]
    pub fn all_subnet_ids(&self) -> Vec<String> {
        self.public_subnet_ids
            .iter()
            .chain(self.private_subnet_ids.iter())
            .cloned()
            .collect()
    }
}

/// A derived subdivision of the address block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetSpec {
    /// Subnet address block.
    pub cidr: String,
    /// Availability zone the subnet lands in.
    pub availability_zone: String,
    /// Whether the subnet is publicly routable.
    pub public: bool,
}

/// Parse and validate an IPv4 address block.
///
/// Pure; usable without any provider interaction.
///
/// # Errors
/// Returns a validation error for malformed notation, an out-of-range
/// prefix, or a base address with host bits set under the prefix.
pub fn validate_cidr(cidr: &str) -> Result<(Ipv4Addr, u8), ProvisionError> {
    let (addr_part, prefix_part) = cidr
        .split_once('/')
        .ok_or_else(|| ProvisionError::Validation(format!("invalid CIDR block: {cidr}")))?;

    let addr: Ipv4Addr = addr_part
        .parse()
        .map_err(|_| ProvisionError::Validation(format!("invalid CIDR block: {cidr}")))?;

    let prefix: u8 = prefix_part
        .parse()
        .map_err(|_| ProvisionError::Validation(format!("invalid CIDR block: {cidr}")))?;
    if prefix > 32 {
        return Err(ProvisionError::Validation(format!(
            "invalid CIDR prefix length: {cidr}"
        )));
    }

    let host_mask = u32::MAX.checked_shr(u32::from(prefix)).unwrap_or(0);
    if u32::from(addr) & host_mask != 0 {
        return Err(ProvisionError::Validation(format!(
            "CIDR base address has host bits set: {cidr}"
        )));
    }

    Ok((addr, prefix))
}

/// Carve the address block into one public and one private subnet per zone.
///
/// Each subnet is four bits narrower than the parent block; public slices
/// come first, then private ones. Pure arithmetic, no provider interaction.
///
/// # Errors
/// Returns a validation error if there are no zones or the block is too
/// small to subdivide.
pub fn derive_subnets(
    base: Ipv4Addr,
    prefix: u8,
    zones: &[String],
) -> Result<Vec<SubnetSpec>, ProvisionError> {
    if zones.is_empty() {
        return Err(ProvisionError::Validation(
            "at least one availability zone is required".to_string(),
        ));
    }

    let subnet_prefix = prefix + 4;
    if subnet_prefix > 32 {
        return Err(ProvisionError::Validation(format!(
            "address block /{prefix} is too small to subdivide"
        )));
    }

    let zones = &zones[..zones.len().min(MAX_ZONES)];
    let slice_size = 1u32 << (32 - subnet_prefix);
    let base = u32::from(base);

    let mut subnets = Vec::with_capacity(zones.len() * 2);
    for (tier, public) in [(0u32, true), (1u32, false)] {
        for (i, zone) in zones.iter().enumerate() {
            let offset = tier * zones.len() as u32 + i as u32;
            let subnet_base = Ipv4Addr::from(base + offset * slice_size);
            subnets.push(SubnetSpec {
                cidr: format!("{subnet_base}/{subnet_prefix}"),
                availability_zone: zone.clone(),
                public,
            });
        }
    }

    Ok(subnets)
}

/// Create (or adopt) the isolated network.
///
/// # Errors
/// Returns a validation error before any provider call for a malformed
/// block; provider errors propagate unchanged.
pub async fn create_network(
    api: &dyn AwsApi,
    name: &str,
    cidr: &str,
    dns_enabled: bool,
) -> Result<NetworkHandle, ProvisionError> {
    let (base, prefix) = validate_cidr(cidr)?;

    if let Some(existing) = api.find_vpc(name).await? {
        info!(vpc_id = %existing.vpc_id, "Network already exists, adopting");
        let subnets = api.describe_subnets(&existing.vpc_id).await?;
        return Ok(handle_from_subnets(existing.vpc_id, existing.cidr_block, &subnets));
    }

    let vpc = api.create_vpc(cidr, name).await?;
    api.modify_vpc_attributes(&vpc.vpc_id, dns_enabled, dns_enabled)
        .await?;

    let zones: Vec<String> = api
        .describe_availability_zones()
        .await?
        .into_iter()
        .filter(|z| z.state == "available")
        .map(|z| z.zone_name)
        .collect();
    if zones.is_empty() {
        return Err(ProvisionError::Config(
            "no available zones in region".to_string(),
        ));
    }

    let mut public_subnet_ids = Vec::new();
    let mut private_subnet_ids = Vec::new();
    for spec in derive_subnets(base, prefix, &zones)? {
        let (tier, role_tag) = if spec.public {
            ("public", PUBLIC_SUBNET_TAG)
        } else {
            ("private", PRIVATE_SUBNET_TAG)
        };
        let tags = vec![
            Tag::new("Name", format!("{name}-{tier}-{}", spec.availability_zone)),
            Tag::new(role_tag, "1"),
        ];

        let subnet = api
            .create_subnet(&vpc.vpc_id, &spec.cidr, &spec.availability_zone, tags)
            .await?;
        if spec.public {
            public_subnet_ids.push(subnet.subnet_id);
        } else {
            private_subnet_ids.push(subnet.subnet_id);
        }
    }

    info!(
        vpc_id = %vpc.vpc_id,
        public = public_subnet_ids.len(),
        private = private_subnet_ids.len(),
        "Network created"
    );

    Ok(NetworkHandle {
        vpc_id: vpc.vpc_id,
        cidr: vpc.cidr_block,
        public_subnet_ids,
        private_subnet_ids,
    })
}

fn handle_from_subnets(vpc_id: String, cidr: String, subnets: &[Subnet]) -> NetworkHandle {
    let mut public_subnet_ids = Vec::new();
    let mut private_subnet_ids = Vec::new();
    for subnet in subnets {
        if subnet.tags.iter().any(|t| t.key == PUBLIC_SUBNET_TAG) {
            public_subnet_ids.push(subnet.subnet_id.clone());
        } else {
            private_subnet_ids.push(subnet.subnet_id.clone());
        }
    }

    NetworkHandle {
        vpc_id,
        cidr,
        public_subnet_ids,
        private_subnet_ids,
    }
}
