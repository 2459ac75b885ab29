//! Placeholder substitution for alert templates
//!
//! Supported tokens: `{service}`, `{costCenter}`, `{costOwner}`,
//! `{businessUnit}` and `{environment}`. Any other `{token}` is an error; an
//! unmatched `{` is kept literally.

use costsync_domain::{
    AlertChannel, AlertRuleTemplate, ConfigurationError, Environment, ResolvedAlertRule,
    ResolvedAllocation,
};

/// Values available to alert templates for one (service, environment).
#[derive(Debug, Clone, Copy)]
pub struct PlaceholderContext<'a> {
    pub service: &'a str,
    pub allocation: &'a ResolvedAllocation,
    pub environment: Environment,
}

impl<'a> PlaceholderContext<'a> {
    fn lookup(&self, token: &str) -> Option<&'a str> {
        match token {
            "service" => Some(self.service),
            "costCenter" => Some(&self.allocation.cost_center),
            "costOwner" => Some(&self.allocation.cost_owner),
            "businessUnit" => Some(&self.allocation.business_unit),
            "environment" => Some(self.environment.as_str()),
            _ => None,
        }
    }

    /// Substitutes every token in `template`. `field` names the location for
    /// error reporting.
    ///
    /// # Errors
    /// [`ConfigurationError::MissingVariable`] on the first unknown token.
    pub fn substitute(&self, template: &str, field: &str) -> Result<String, ConfigurationError> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                out.push_str(&rest[open..]);
                return Ok(out);
            };

            let token = &after[..close];
            let value = self.lookup(token).ok_or_else(|| ConfigurationError::MissingVariable {
                service: self.service.to_string(),
                variable: token.to_string(),
                field: field.to_string(),
            })?;
            out.push_str(value);
            rest = &after[close + 1..];
        }

        out.push_str(rest);
        Ok(out)
    }

    /// Resolves one alert template, substituting its name and every channel
    /// target.
    ///
    /// # Errors
    /// [`ConfigurationError::MissingVariable`] for an unknown token.
    pub fn render_rule(
        &self,
        template: &AlertRuleTemplate,
    ) -> Result<ResolvedAlertRule, ConfigurationError> {
        let name = self.substitute(&template.name, &format!("alert '{}' name", template.name))?;
        let channels = template
            .channels
            .iter()
            .map(|channel| {
                let field = format!("alert '{}' {} channel", template.name, channel.kind);
                Ok(AlertChannel::new(channel.kind, self.substitute(&channel.target, &field)?))
            })
            .collect::<Result<Vec<_>, ConfigurationError>>()?;

        Ok(ResolvedAlertRule {
            name,
            threshold_pct: template.threshold_pct,
            severity: template.severity,
            channels,
            frequency: template.frequency,
        })
    }
}
