use chrono::{DateTime, Utc};
use fcst_core::data_model::MAX_RESOURCE_NAME_LEN;
use fcst_core::{ForecastError, PipelineConfig, RunIdentity};

/// Maps run identities to remote resource names.
#[derive(Debug, Clone)]
pub struct IdentityDeriver {
    prefix: String,
}

impl IdentityDeriver {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.name_prefix.clone())
    }

    /// Fresh identity for a run starting now.
    pub fn generate(&self) -> RunIdentity {
        self.generate_at(Utc::now())
    }

    pub fn generate_at(&self, at: DateTime<Utc>) -> RunIdentity {
        RunIdentity::from_timestamp(at)
    }

    /// The name every remote resource of `run` is created under. Fails when
    /// the prefixed name would exceed the registry's name limit.
    pub fn resource_name(&self, run: &RunIdentity) -> Result<String, ForecastError> {
        if self.prefix.len() + run.as_str().len() > MAX_RESOURCE_NAME_LEN {
            return Err(ForecastError::InvalidRunIdentity(run.to_string()));
        }
        Ok(format!("{}{}", self.prefix, run))
    }
}

impl Default for IdentityDeriver {
    fn default() -> Self {
        Self::new("id")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_resource_name_is_prefixed() {
        let deriver = IdentityDeriver::default();
        let at = Utc.with_ymd_and_hms(2020, 12, 31, 23, 59, 58).unwrap();
        let run = deriver.generate_at(at);
        assert_eq!(run.as_str(), "20201231235958000");
        assert_eq!(deriver.resource_name(&run).unwrap(), "id20201231235958000");
    }

    #[test]
    fn test_derivation_is_stable() {
        let deriver = IdentityDeriver::new("run");
        let run = RunIdentity::parse("20200101000000123").unwrap();
        assert_eq!(
            deriver.resource_name(&run).unwrap(),
            deriver.resource_name(&run.clone()).unwrap()
        );
        assert_eq!(deriver.resource_name(&run).unwrap(), "run20200101000000123");
    }

    #[test]
    fn test_name_limit_depends_on_prefix() {
        let run = RunIdentity::parse(&"1".repeat(60)).unwrap();
        assert_eq!(IdentityDeriver::new("id").resource_name(&run).unwrap().len(), 62);

        let err = IdentityDeriver::new("fcst").resource_name(&run).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidRunIdentity(_)));
    }
}
