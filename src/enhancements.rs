//! Enhancement sets and the [`Enhancer`] handle that builds them.
//!
//! An [`Enhancements`] value is immutable. Its effective rule sequence is
//! the rules of every resolved base, in reference order, followed by its own
//! rules. Parsed rule lists are shared through the [`RuleCache`], so building
//! the same configuration twice costs one parse.

use crate::bases::BaseRegistry;
use crate::cache::{Fingerprint, ParsedRules, RuleCache, Source};
use crate::codec::{self, EnhancementsStructure};
use crate::config::EngineConfig;
use crate::engine::{self, EvaluationContext, MARKED_IN_APP, MARKED_OUT_OF_APP};
use crate::error::Result;
use crate::rules::{parse_enhancements, Rule, RuleDict};
use crate::types::{
    ExceptionData, Frame, FrameComponent, FrameCounts, GroupingVariant, StackDirection,
    StacktraceComponent,
};
use serde::Serialize;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// Serializable summary of an enhancement set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnhancementsDict {
    pub id: Option<String>,
    pub bases: Vec<String>,
    pub latest: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<RuleDict>>,
}

/// Builds enhancement sets. Owns the base registry and the rule cache; share
/// it by reference (or `Arc`) between threads.
#[derive(Debug)]
pub struct Enhancer {
    config: EngineConfig,
    registry: BaseRegistry,
    cache: RuleCache,
}

impl Enhancer {
    /// Validate `config` and load the built-in bases.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let registry = BaseRegistry::builtin()?;
        Self::with_registry(config, registry)
    }

    pub fn with_registry(config: EngineConfig, registry: BaseRegistry) -> Result<Self> {
        config.validate()?;
        let cache = RuleCache::with_capacity(config.cache_capacity)?;
        Ok(Self { config, registry, cache })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &BaseRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &RuleCache {
        &self.cache
    }

    /// Parse DSL text into a set layered on `bases`. Unknown bases are skipped.
    pub fn from_config_string<I, S>(&self, text: &str, bases: I, id: Option<&str>) -> Result<Enhancements>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key = Fingerprint::of(Source::Text, text.as_bytes());
        let own = self
            .cache
            .get_or_try_insert(key, || Ok(ParsedRules::from_text_rules(parse_enhancements(text)?)))?;
        let bases = bases.into_iter().map(Into::into).collect();
        Ok(self.assemble(own, bases, id.map(str::to_string)))
    }

    /// Decode a set from its base64 form.
    pub fn loads(&self, encoded: &str) -> Result<Enhancements> {
        let encoded = encoded.trim();
        let key = Fingerprint::of(Source::Binary, encoded.as_bytes());
        let own = self.cache.get_or_try_insert(key, || {
            let (version, bases, structures) = codec::decode(encoded)?;
            let rules = structures
                .into_iter()
                .map(Rule::from_config_structure)
                .collect::<Result<Vec<_>>>()?;
            debug!("Decoded {} rules on {} bases", rules.len(), bases.len());
            Ok(ParsedRules { version, bases, rules })
        })?;
        let bases = own.bases.clone();
        Ok(self.assemble(own, bases, None))
    }

    /// A built-in base as a standalone set, identified by its id.
    pub fn base(&self, id: &str) -> Option<Enhancements> {
        let rules = Arc::clone(self.registry.get(id)?);
        Some(self.assemble(rules, Vec::new(), Some(id.to_string())))
    }

    fn assemble(&self, own: Arc<ParsedRules>, bases: Vec<String>, id: Option<String>) -> Enhancements {
        let mut base_rules = Vec::with_capacity(bases.len());
        for base in &bases {
            match self.registry.get(base) {
                Some(rules) => base_rules.push(Arc::clone(rules)),
                None => warn!("Skipping unknown enhancement base {}", base),
            }
        }
        let latest = id.as_deref() == Some(self.config.latest_base.as_str());
        Enhancements {
            legacy: self.config.is_legacy(&bases),
            direction: self.config.stack_direction,
            id,
            bases,
            own,
            base_rules,
            latest,
            encoded: OnceLock::new(),
        }
    }
}

/// An immutable, fully resolved enhancement set.
#[derive(Debug)]
pub struct Enhancements {
    id: Option<String>,
    bases: Vec<String>,
    own: Arc<ParsedRules>,
    /// Rules of the resolved bases, in reference order
    base_rules: Vec<Arc<ParsedRules>>,
    legacy: bool,
    latest: bool,
    direction: StackDirection,
    encoded: OnceLock<String>,
}

impl Enhancements {
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn version(&self) -> u32 {
        self.own.version
    }

    pub fn bases(&self) -> &[String] {
        &self.bases
    }

    /// Rules defined by this set itself, without its bases
    pub fn rules(&self) -> &[Rule] {
        &self.own.rules
    }

    /// Base rules in reference order, then own rules
    pub fn effective_rules(&self) -> impl Iterator<Item = &Rule> + Clone + '_ {
        self.base_rules
            .iter()
            .flat_map(|chunk| chunk.rules.iter())
            .chain(self.own.rules.iter())
    }

    pub fn is_legacy(&self) -> bool {
        self.legacy
    }

    /// Pass 1: write in-app and category decisions onto `frames`.
    ///
    /// When a rule changes a frame's in-app value, the value it had before is
    /// kept in `frame.data.orig_in_app`.
    pub fn apply_category_and_updated_in_app_to_frames(
        &self,
        frames: &mut [Frame],
        platform: Option<&str>,
        exception: &ExceptionData,
    ) {
        let mut ctx = EvaluationContext::new(frames, platform, exception, self.direction);
        let modifications = engine::apply_modifications(self.effective_rules(), &mut ctx);

        for (frame, modification) in frames.iter_mut().zip(modifications) {
            if let Some(in_app) = modification.in_app {
                frame.set_in_app(in_app);
            }
            if let Some(category) = modification.category {
                frame.set_category(category);
            }
        }
    }

    /// Pass 2: build the stacktrace component for one grouping variant from
    /// the upstream frame components and the frames classified by pass 1.
    pub fn assemble_stacktrace_component(
        &self,
        variant: GroupingVariant,
        mut components: Vec<FrameComponent>,
        frames: &[Frame],
        platform: Option<&str>,
        exception: Option<&ExceptionData>,
    ) -> StacktraceComponent {
        let no_exception = ExceptionData::default();
        let exception = exception.unwrap_or(&no_exception);
        let ctx = EvaluationContext::new(frames, platform, exception, self.direction);
        let result = engine::assemble_contributions(self.effective_rules(), &ctx, &components);

        let mut frame_counts = FrameCounts::default();
        for (component, outcome) in components.iter_mut().zip(result.frames) {
            if !self.legacy && variant == GroupingVariant::App && !component.in_app {
                // system frames never contribute to the app variant; only an
                // out-of-app hint explains that
                let hint = match outcome.hint {
                    Some(hint) if hint.starts_with(MARKED_OUT_OF_APP) => Some(hint),
                    _ => component.hint.take(),
                };
                component.update(false, hint);
            } else if variant == GroupingVariant::System {
                // in-app decisions have no effect on the system variant
                let hint = match outcome.hint {
                    Some(hint)
                        if !hint.starts_with(MARKED_IN_APP) && !hint.starts_with(MARKED_OUT_OF_APP) =>
                    {
                        Some(hint)
                    }
                    _ => component.hint.take(),
                };
                component.update(outcome.contributes, hint);
            } else {
                component.update(outcome.contributes, outcome.hint);
            }
            frame_counts.record(component.in_app, component.contributes);
        }

        let (contributes, hint) = if !self.legacy
            && variant == GroupingVariant::App
            && frame_counts.in_app_contributing_frames == 0
        {
            (false, None)
        } else {
            (result.contributes, result.hint)
        };

        StacktraceComponent {
            values: components,
            contributes,
            hint,
            frame_counts,
            inverted_hierarchy: result.invert_stacktrace,
        }
    }

    /// Binary structure of the set: own rules only, bases by reference.
    pub fn to_config_structure(&self) -> EnhancementsStructure {
        (
            self.version(),
            self.bases.clone(),
            self.own.rules.iter().map(Rule::to_config_structure).collect(),
        )
    }

    /// The encoded form, computed on first use.
    pub fn base64_string(&self) -> Result<&str> {
        if let Some(encoded) = self.encoded.get() {
            return Ok(encoded);
        }
        let encoded = codec::encode(&self.to_config_structure())?;
        Ok(self.encoded.get_or_init(|| encoded))
    }

    pub fn as_dict(&self, with_rules: bool) -> EnhancementsDict {
        EnhancementsDict {
            id: self.id.clone(),
            bases: self.bases.clone(),
            latest: self.latest,
            rules: with_rules.then(|| self.own.rules.iter().map(Rule::as_dict).collect()),
        }
    }
}
