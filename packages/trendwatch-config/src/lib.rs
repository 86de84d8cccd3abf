mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EmbeddingProviderConfig, PhraseProviderConfig, Postgres, Providers, Scheduler, Search,
	Service, Storage, Trends, Vectors,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.vectors.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.vectors.vector_dim."
				.to_string(),
		});
	}
	if !is_sql_identifier(&cfg.storage.vectors.items_table) {
		return Err(Error::Validation {
			message: "storage.vectors.items_table must be a plain SQL identifier.".to_string(),
		});
	}

	validate_trends(&cfg.trends)?;

	if cfg.scheduler.trend_interval_minutes == 0 {
		return Err(Error::Validation {
			message: "scheduler.trend_interval_minutes must be greater than zero.".to_string(),
		});
	}
	if cfg.scheduler.refresh_enabled && cfg.scheduler.refresh_interval_minutes == 0 {
		return Err(Error::Validation {
			message: "scheduler.refresh_interval_minutes must be greater than zero.".to_string(),
		});
	}
	if cfg.search.default_top_k == 0 {
		return Err(Error::Validation {
			message: "search.default_top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.search.default_top_k > cfg.search.max_top_k {
		return Err(Error::Validation {
			message: "search.default_top_k must not exceed search.max_top_k.".to_string(),
		});
	}

	for (label, key) in
		[("embedding", &cfg.providers.embedding.api_key), ("phrase", &cfg.providers.phrase.api_key)]
	{
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	if !cfg.providers.phrase.temperature.is_finite() || cfg.providers.phrase.temperature < 0.0 {
		return Err(Error::Validation {
			message: "providers.phrase.temperature must be a finite number, zero or greater."
				.to_string(),
		});
	}

	Ok(())
}

fn validate_trends(trends: &Trends) -> Result<()> {
	if !trends.dbscan_eps.is_finite() || trends.dbscan_eps <= 0.0 || trends.dbscan_eps > 2.0 {
		return Err(Error::Validation {
			message: "trends.dbscan_eps must be in the range (0.0, 2.0].".to_string(),
		});
	}

	for (label, value) in [
		("trends.min_cluster_size", trends.min_cluster_size),
		("trends.dbscan_min_samples", trends.dbscan_min_samples),
		("trends.top_n_trends", trends.top_n_trends),
		("trends.top_query_count", trends.top_query_count),
		("trends.phrase_max_words", trends.phrase_max_words),
	] {
		if value == 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	if let Some(max_rows) = trends.max_rows
		&& max_rows < trends.min_cluster_size
	{
		return Err(Error::Validation {
			message: "trends.max_rows must be at least trends.min_cluster_size.".to_string(),
		});
	}
	if trends.batch_interval_minutes == Some(0) {
		return Err(Error::Validation {
			message: "trends.batch_interval_minutes must be greater than zero when set."
				.to_string(),
		});
	}

	for (label, value) in [
		("trends.volume_weight", trends.volume_weight),
		("trends.recency_weight", trends.recency_weight),
	] {
		if !value.is_finite() {
			return Err(Error::Validation { message: format!("{label} must be a finite number.") });
		}
		if value < 0.0 {
			return Err(Error::Validation { message: format!("{label} must be zero or greater.") });
		}
	}

	if !trends.recency_decay_minutes.is_finite() || trends.recency_decay_minutes <= 0.0 {
		return Err(Error::Validation {
			message: "trends.recency_decay_minutes must be a finite number greater than zero."
				.to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	trim_in_place(&mut cfg.service.http_bind);
	trim_in_place(&mut cfg.service.log_level);
	trim_in_place(&mut cfg.storage.vectors.items_table);

	let embedding = &mut cfg.providers.embedding;

	for value in [
		&mut embedding.api_base,
		&mut embedding.api_key,
		&mut embedding.path,
		&mut embedding.model,
	] {
		trim_in_place(value);
	}

	let phrase = &mut cfg.providers.phrase;

	for value in [&mut phrase.api_base, &mut phrase.api_key, &mut phrase.path, &mut phrase.model] {
		trim_in_place(value);
	}

	if cfg.trends.max_rows == Some(0) {
		cfg.trends.max_rows = None;
	}
}

fn trim_in_place(value: &mut String) {
	let trimmed = value.trim();

	if trimmed.len() != value.len() {
		*value = trimmed.to_string();
	}
}

pub fn is_sql_identifier(raw: &str) -> bool {
	let mut chars = raw.chars();
	let Some(first) = chars.next() else {
		return false;
	};

	(first.is_ascii_alphabetic() || first == '_')
		&& chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}
