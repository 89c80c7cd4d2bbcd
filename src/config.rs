use serde::Deserialize;
use std::collections::BTreeMap;

/// A named gateway endpoint (`name=url` in the environment).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GatewayEndpoint {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Source adapters reachable through the operator's gateway, in declaration order.
    pub source_gateways: Vec<GatewayEndpoint>,
    /// Verification providers in priority order.
    pub verification_gateways: Vec<GatewayEndpoint>,
    pub company_intel_url: Option<String>,
    pub gateway_token: Option<String>,
    pub pipeline: PipelineSettings,
}

/// Category weights for the composite score. They sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CategoryWeights {
    pub demographic: f64,
    pub behavioral: f64,
    pub data_quality: f64,
    pub company_intelligence: f64,
    pub social_proof: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            demographic: 0.25,
            behavioral: 0.30,
            data_quality: 0.15,
            company_intelligence: 0.20,
            social_proof: 0.10,
        }
    }
}

/// Layer weights for the verification deliverability average.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct VerificationWeights {
    pub format: f64,
    pub dns: f64,
    pub external: f64,
    pub cross_reference: f64,
}

impl Default for VerificationWeights {
    fn default() -> Self {
        Self {
            format: 0.3,
            dns: 0.3,
            external: 0.3,
            cross_reference: 0.1,
        }
    }
}

/// Lower bounds of each letter tier, highest first.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TierCutoffs {
    pub a_plus: f64,
    pub a: f64,
    pub b_plus: f64,
    pub b: f64,
    pub c_plus: f64,
    pub c: f64,
}

impl Default for TierCutoffs {
    fn default() -> Self {
        Self {
            a_plus: 90.0,
            a: 80.0,
            b_plus: 70.0,
            b: 60.0,
            c_plus: 50.0,
            c: 40.0,
        }
    }
}

/// Every tunable constant of the research pipeline.
///
/// The defaults are heuristic starting points, not tuned values.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSettings {
    /// Maximum simultaneous calls into external collaborators.
    pub max_concurrency: usize,
    /// Minimum spacing between two dispatches, in milliseconds. 0 disables pacing.
    pub min_dispatch_spacing_ms: u64,
    /// Candidates requested from each source, as a multiple of the target count.
    pub source_oversample: usize,
    /// Similarity strictly above this merges two records.
    pub merge_threshold: u32,
    /// Similarity strictly above this flags the pair for audit.
    pub similar_threshold: u32,
    pub category_weights: CategoryWeights,
    pub verification_weights: VerificationWeights,
    pub tier_cutoffs: TierCutoffs,
    /// Trust weight (0-100) per source tag, lowercased.
    pub source_trust: BTreeMap<String, f64>,
    /// Trust weight for sources missing from `source_trust`.
    pub default_source_trust: f64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        let source_trust = [
            ("linkedin", 90.0),
            ("apollo", 85.0),
            ("zoominfo", 85.0),
            ("crunchbase", 80.0),
            ("clearbit", 80.0),
            ("hunter", 75.0),
            ("company_website", 70.0),
            ("github", 65.0),
            ("manual", 60.0),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            max_concurrency: 5,
            min_dispatch_spacing_ms: 100,
            source_oversample: 2,
            merge_threshold: 85,
            similar_threshold: 70,
            category_weights: CategoryWeights::default(),
            verification_weights: VerificationWeights::default(),
            tier_cutoffs: TierCutoffs::default(),
            source_trust,
            default_source_trust: 50.0,
        }
    }
}

impl PipelineSettings {
    /// Trust weight for a source tag.
    pub fn trust_for(&self, source: &str) -> f64 {
        self.source_trust
            .get(&source.to_lowercase())
            .copied()
            .unwrap_or(self.default_source_trust)
    }

    /// Apply `PIPELINE_*` overrides from the environment.
    pub fn with_env_overrides(mut self) -> anyhow::Result<Self> {
        if let Some(v) = env_parse::<usize>("PIPELINE_MAX_CONCURRENCY")? {
            if v == 0 {
                anyhow::bail!("PIPELINE_MAX_CONCURRENCY must be at least 1");
            }
            self.max_concurrency = v;
        }
        if let Some(v) = env_parse::<u64>("PIPELINE_MIN_SPACING_MS")? {
            self.min_dispatch_spacing_ms = v;
        }
        if let Some(v) = env_parse::<usize>("PIPELINE_SOURCE_OVERSAMPLE")? {
            self.source_oversample = v.max(1);
        }
        if let Some(v) = env_parse::<u32>("PIPELINE_MERGE_THRESHOLD")? {
            if v > 100 {
                anyhow::bail!("PIPELINE_MERGE_THRESHOLD must be between 0-100");
            }
            self.merge_threshold = v;
        }
        if let Some(v) = env_parse::<u32>("PIPELINE_SIMILAR_THRESHOLD")? {
            if v > 100 {
                anyhow::bail!("PIPELINE_SIMILAR_THRESHOLD must be between 0-100");
            }
            self.similar_threshold = v;
        }
        if let Some(raw) = env_text("PIPELINE_CATEGORY_WEIGHTS") {
            self.category_weights = CategoryWeights::parse(&raw)?;
        }
        if let Some(raw) = env_text("PIPELINE_VERIFICATION_WEIGHTS") {
            self.verification_weights = VerificationWeights::parse(&raw)?;
        }
        if let Some(raw) = env_text("PIPELINE_TIER_CUTOFFS") {
            self.tier_cutoffs = TierCutoffs::parse(&raw)?;
        }
        if let Some(raw) = env_text("PIPELINE_SOURCE_TRUST") {
            self.source_trust.extend(parse_source_trust(&raw)?);
        }
        if let Some(v) = env_parse::<f64>("PIPELINE_DEFAULT_SOURCE_TRUST")? {
            if !(0.0..=100.0).contains(&v) {
                anyhow::bail!("PIPELINE_DEFAULT_SOURCE_TRUST must be between 0-100");
            }
            self.default_source_trust = v;
        }
        Ok(self)
    }
}

impl CategoryWeights {
    /// `demographic,behavioral,data_quality,company_intelligence,social_proof`, summing to 1.
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let w = parse_weights("PIPELINE_CATEGORY_WEIGHTS", raw, 5)?;
        Ok(Self {
            demographic: w[0],
            behavioral: w[1],
            data_quality: w[2],
            company_intelligence: w[3],
            social_proof: w[4],
        })
    }
}

impl VerificationWeights {
    /// `format,dns,external,cross_reference`, summing to 1.
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let w = parse_weights("PIPELINE_VERIFICATION_WEIGHTS", raw, 4)?;
        Ok(Self {
            format: w[0],
            dns: w[1],
            external: w[2],
            cross_reference: w[3],
        })
    }
}

impl TierCutoffs {
    /// Six lower bounds from A+ down to C, strictly decreasing and within 0-100.
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let c = parse_number_list("PIPELINE_TIER_CUTOFFS", raw, 6)?;
        if c.iter().any(|v| !(0.0..=100.0).contains(v)) {
            anyhow::bail!("PIPELINE_TIER_CUTOFFS values must be between 0-100");
        }
        if c.windows(2).any(|w| w[0] <= w[1]) {
            anyhow::bail!("PIPELINE_TIER_CUTOFFS must be strictly decreasing");
        }
        Ok(Self {
            a_plus: c[0],
            a: c[1],
            b_plus: c[2],
            b: c[3],
            c_plus: c[4],
            c: c[5],
        })
    }
}

fn env_text(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn parse_number_list(key: &str, raw: &str, expected: usize) -> anyhow::Result<Vec<f64>> {
    let values = raw
        .split(',')
        .map(|v| {
            v.trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .ok_or_else(|| anyhow::anyhow!("{} must hold numbers, got '{}'", key, v.trim()))
        })
        .collect::<anyhow::Result<Vec<f64>>>()?;
    if values.len() != expected {
        anyhow::bail!("{} needs {} values, got {}", key, expected, values.len());
    }
    Ok(values)
}

fn parse_weights(key: &str, raw: &str, expected: usize) -> anyhow::Result<Vec<f64>> {
    let weights = parse_number_list(key, raw, expected)?;
    if weights.iter().any(|w| *w < 0.0) {
        anyhow::bail!("{} weights cannot be negative", key);
    }
    let sum: f64 = weights.iter().sum();
    if (sum - 1.0).abs() > 1e-6 {
        anyhow::bail!("{} weights must sum to 1, got {}", key, sum);
    }
    Ok(weights)
}

/// Parse `source=trust,source=trust`, trust within 0-100.
pub fn parse_source_trust(raw: &str) -> anyhow::Result<BTreeMap<String, f64>> {
    let mut trust = BTreeMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, value) = entry
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("PIPELINE_SOURCE_TRUST entries must look like name=trust"))?;
        let value: f64 = value
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("PIPELINE_SOURCE_TRUST value for '{}' must be a number", name.trim()))?;
        if name.trim().is_empty() || !(0.0..=100.0).contains(&value) {
            anyhow::bail!("PIPELINE_SOURCE_TRUST entry '{}' is invalid", entry);
        }
        trust.insert(name.trim().to_lowercase(), value);
    }
    Ok(trust)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> anyhow::Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{} must be a valid number", key)),
        _ => Ok(None),
    }
}

/// First characters of a connection string, safe to log.
pub fn redacted_prefix(url: &str) -> String {
    url.chars().take(20).collect()
}

/// Parse `name=url,name=url` into endpoints, keeping declaration order.
pub fn parse_gateway_list(key: &str, raw: &str) -> anyhow::Result<Vec<GatewayEndpoint>> {
    let mut endpoints = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, url) = entry
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("{} entries must look like name=url", key))?;
        let (name, url) = (name.trim(), url.trim());
        if name.is_empty() {
            anyhow::bail!("{} entry has an empty name", key);
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            anyhow::bail!("{} url for '{}' must start with http:// or https://", key, name);
        }
        endpoints.push(GatewayEndpoint {
            name: name.to_lowercase(),
            url: url.trim_end_matches('/').to_string(),
        });
    }
    Ok(endpoints)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DB_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DB_URL or DATABASE_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DB_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            source_gateways: match std::env::var("SOURCE_GATEWAYS") {
                Ok(raw) => parse_gateway_list("SOURCE_GATEWAYS", &raw)?,
                Err(_) => Vec::new(),
            },
            verification_gateways: match std::env::var("VERIFICATION_GATEWAYS") {
                Ok(raw) => parse_gateway_list("VERIFICATION_GATEWAYS", &raw)?,
                Err(_) => Vec::new(),
            },
            company_intel_url: std::env::var("COMPANY_INTEL_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|url| {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("COMPANY_INTEL_URL must start with http:// or https://");
                    }
                    Ok(url.trim_end_matches('/').to_string())
                })
                .transpose()?,
            gateway_token: std::env::var("GATEWAY_TOKEN")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            pipeline: PipelineSettings::default().with_env_overrides()?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Database URL: {}...", redacted_prefix(&config.database_url));
        tracing::info!(
            "Sources: {:?}, verification providers: {:?}",
            config
                .source_gateways
                .iter()
                .map(|g| g.name.as_str())
                .collect::<Vec<_>>(),
            config
                .verification_gateways
                .iter()
                .map(|g| g.name.as_str())
                .collect::<Vec<_>>()
        );
        if config.company_intel_url.is_none() {
            tracing::warn!("COMPANY_INTEL_URL not set, company enrichment will use defaults");
        }
        tracing::debug!(
            "Pipeline: concurrency={}, spacing={}ms, merge>{}",
            config.pipeline.max_concurrency,
            config.pipeline.min_dispatch_spacing_ms,
            config.pipeline.merge_threshold
        );
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}
