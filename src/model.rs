//! Models and the model registry.
//!
//! A [`Model`] is a named, ordered set of fields. It can inherit from other
//! models, in which case it compiles to an `allOf` composition over its
//! parents, or be cloned from them, which copies every resolved field into a
//! new parent-less model.
//!
//! Models refer to each other by name. The [`ModelRegistry`] owns every
//! declared model and is the only place names are resolved, so
//! self-referencing and mutually recursive models are representable.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use tracing::{debug, trace};

use crate::error::ModelError;
use crate::field::{Field, FieldType};
use crate::mask::Mask;

/// A named, ordered collection of fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Model {
    name: String,
    fields: Vec<(String, Field)>,
    parents: Vec<String>,
    mask: Option<Mask>,
    description: Option<String>,
    strict: bool,
}

impl Model {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a field. A field with the same name is replaced in place.
    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        upsert(&mut self.fields, name.into(), field);
        self
    }

    /// Add several fields in order.
    pub fn extend<I, K>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Field)>,
        K: Into<String>,
    {
        for (name, field) in fields {
            upsert(&mut self.fields, name.into(), field);
        }
        self
    }

    /// Append a parent model name.
    pub fn parent(mut self, name: impl Into<String>) -> Self {
        self.parents.push(name.into());
        self
    }

    /// Mask applied when marshalling without an explicit mask.
    pub fn with_mask(mut self, mask: Mask) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Reject properties not declared on the model.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// New model inheriting from `self`, with `fields` as its own fields.
    pub fn inherit<I, K>(&self, name: impl Into<String>, fields: I) -> Model
    where
        I: IntoIterator<Item = (K, Field)>,
        K: Into<String>,
    {
        Model::inherit_from(name, &[self], fields)
    }

    /// New model inheriting from every model in `parents`, in order.
    pub fn inherit_from<I, K>(name: impl Into<String>, parents: &[&Model], fields: I) -> Model
    where
        I: IntoIterator<Item = (K, Field)>,
        K: Into<String>,
    {
        let mut model = Model::new(name).extend(fields);
        model.parents = parents.iter().map(|p| p.name.clone()).collect();
        model
    }

    /// New parent-less model holding a deep copy of every field of `sources`.
    ///
    /// Later sources win on name collisions. Discriminator defaults stamped
    /// by resolution are dropped so the copy is tagged with its own name.
    pub fn from_sources(name: impl Into<String>, sources: &[ResolvedModel]) -> Model {
        let mut model = Model::new(name);
        for source in sources {
            for (field_name, field) in &source.fields {
                let mut field = field.clone();
                if field.discriminator {
                    field.default = None;
                }
                upsert(&mut model.fields, field_name.clone(), field);
            }
        }
        model
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Own fields, in declaration order.
    pub fn fields(&self) -> &[(String, Field)] {
        &self.fields
    }

    /// Look up an own field.
    pub fn get(&self, name: &str) -> Option<&Field> {
        lookup(&self.fields, name)
    }

    pub fn parents(&self) -> &[String] {
        &self.parents
    }

    pub fn default_mask(&self) -> Option<&Mask> {
        self.mask.as_ref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }
}

/// A model flattened with all of its ancestors.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedModel {
    pub name: String,
    pub fields: Vec<(String, Field)>,
    pub mask: Option<Mask>,
    pub description: Option<String>,
    pub strict: bool,
    /// Name of the discriminator field, if any.
    pub discriminator: Option<String>,
}

impl ResolvedModel {
    pub fn get(&self, name: &str) -> Option<&Field> {
        lookup(&self.fields, name)
    }

    /// Parent-less model with the flattened fields.
    pub fn into_model(self) -> Model {
        Model {
            name: self.name,
            fields: self.fields,
            parents: Vec::new(),
            mask: self.mask,
            description: self.description,
            strict: self.strict,
        }
    }
}

/// Name to model registry.
///
/// Populated while the application declares its models, read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: BTreeMap<String, Model>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::DuplicateModel` if the name is taken,
    /// `ModelError::UnknownModel` if a parent is not registered, and
    /// `ModelError::InheritanceCycle` if the model names itself as a parent.
    pub fn define(&mut self, model: Model) -> Result<&Model, ModelError> {
        if self.models.contains_key(&model.name) {
            return Err(ModelError::DuplicateModel { name: model.name });
        }
        for parent in &model.parents {
            if *parent == model.name {
                return Err(ModelError::InheritanceCycle {
                    model: model.name.clone(),
                });
            }
            self.lookup(parent)?;
        }

        debug!(
            model = %model.name,
            fields = model.fields.len(),
            parents = ?model.parents,
            "defined model"
        );
        let name = model.name.clone();
        Ok(&*self.models.entry(name).or_insert(model))
    }

    /// Register a model inheriting from the named parents.
    pub fn inherit<I, K>(
        &mut self,
        name: impl Into<String>,
        parents: &[&str],
        fields: I,
    ) -> Result<&Model, ModelError>
    where
        I: IntoIterator<Item = (K, Field)>,
        K: Into<String>,
    {
        let mut model = Model::new(name).extend(fields);
        model.parents = parents.iter().map(|p| p.to_string()).collect();
        self.define(model)
    }

    /// Register a flat copy of the named sources plus `fields`.
    ///
    /// Sources are resolved first, so inherited fields are copied too.
    pub fn clone_model<I, K>(
        &mut self,
        name: impl Into<String>,
        sources: &[&str],
        fields: I,
    ) -> Result<&Model, ModelError>
    where
        I: IntoIterator<Item = (K, Field)>,
        K: Into<String>,
    {
        let resolved = sources
            .iter()
            .map(|source| self.resolve_name(source))
            .collect::<Result<Vec<_>, _>>()?;
        let model = Model::from_sources(name, &resolved).extend(fields);
        self.define(model)
    }

    pub fn get(&self, name: &str) -> Option<&Model> {
        self.models.get(name)
    }

    /// Look up a model, failing on unknown names.
    pub fn lookup(&self, name: &str) -> Result<&Model, ModelError> {
        self.models
            .get(name)
            .ok_or_else(|| ModelError::UnknownModel {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Registered models, ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = &Model> {
        self.models.values()
    }

    /// Flatten a model with its ancestors.
    ///
    /// Parents are merged depth-first, left to right; later parents overwrite
    /// earlier ones and the model's own fields overwrite every parent. The
    /// single discriminator field, if any, defaults to the model's own name.
    ///
    /// # Errors
    ///
    /// Returns `ModelError` on an unknown parent, an inheritance cycle, or more
    /// than one discriminator in the flattened field set.
    pub fn resolve(&self, model: &Model) -> Result<ResolvedModel, ModelError> {
        let mut fields = Vec::new();
        let mut path = Vec::new();
        self.collect_fields(model, &mut path, &mut fields)?;

        let discriminators: Vec<String> = fields
            .iter()
            .filter(|(_, field)| field.discriminator)
            .map(|(name, _)| name.clone())
            .collect();
        if discriminators.len() > 1 {
            return Err(ModelError::DuplicateDiscriminator {
                model: model.name.clone(),
                fields: discriminators,
            });
        }

        let discriminator = discriminators.into_iter().next();
        if let Some(name) = &discriminator {
            if let Some((_, field)) = fields.iter_mut().find(|(n, _)| n == name) {
                field.default = Some(Value::String(model.name.clone()));
            }
        }

        trace!(model = %model.name, fields = fields.len(), "resolved model");
        Ok(ResolvedModel {
            name: model.name.clone(),
            fields,
            mask: model.mask.clone(),
            description: model.description.clone(),
            strict: model.strict,
            discriminator,
        })
    }

    /// Resolve a registered model by name.
    pub fn resolve_name(&self, name: &str) -> Result<ResolvedModel, ModelError> {
        self.resolve(self.lookup(name)?)
    }

    fn collect_fields(
        &self,
        model: &Model,
        path: &mut Vec<String>,
        out: &mut Vec<(String, Field)>,
    ) -> Result<(), ModelError> {
        if path.contains(&model.name) {
            return Err(ModelError::InheritanceCycle {
                model: model.name.clone(),
            });
        }
        path.push(model.name.clone());

        for parent in &model.parents {
            let parent = self.lookup(parent)?;
            self.collect_fields(parent, path, out)?;
        }
        for (name, field) in &model.fields {
            upsert(out, name.clone(), field.clone());
        }

        path.pop();
        Ok(())
    }

    /// The model's own name plus the names of all of its ancestors.
    pub fn ancestors(&self, name: &str) -> Result<BTreeSet<String>, ModelError> {
        let mut seen = BTreeSet::new();
        let mut pending = vec![name.to_string()];
        while let Some(current) = pending.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            let model = self.lookup(&current)?;
            pending.extend(model.parents.iter().cloned());
        }
        Ok(seen)
    }

    /// The single ancestor shared by every named model.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::AmbiguousAncestor` unless the intersection of the
    /// ancestor sets holds exactly one name.
    pub fn common_ancestor<'a, I>(&self, names: I) -> Result<&Model, ModelError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let names: Vec<&str> = names.into_iter().collect();
        let mut common: Option<BTreeSet<String>> = None;
        for name in &names {
            let ancestors = self.ancestors(name)?;
            common = Some(match common {
                None => ancestors,
                Some(acc) => acc.intersection(&ancestors).cloned().collect(),
            });
        }

        match common {
            Some(set) if set.len() == 1 => {
                let ancestor = set.into_iter().next().unwrap_or_default();
                self.lookup(&ancestor)
            }
            _ => Err(ModelError::AmbiguousAncestor {
                models: names.iter().map(|n| n.to_string()).collect(),
            }),
        }
    }

    /// Check every registered model: nested references resolve, polymorphic
    /// mappings share one ancestor, and the model itself resolves.
    pub fn check(&self) -> Result<(), ModelError> {
        for model in self.models.values() {
            self.resolve(model)?;
            for (_, field) in &model.fields {
                for target in field.referenced_models() {
                    self.lookup(target)?;
                }
                self.check_polymorphic(field)?;
            }
        }
        Ok(())
    }

    fn check_polymorphic(&self, field: &Field) -> Result<(), ModelError> {
        match &field.field_type {
            FieldType::Polymorphic { mapping } => {
                self.common_ancestor(mapping.values().map(String::as_str))?;
            }
            FieldType::List { items, .. } => self.check_polymorphic(items)?,
            _ => {}
        }
        Ok(())
    }
}

fn lookup<'a>(fields: &'a [(String, Field)], name: &str) -> Option<&'a Field> {
    fields.iter().find(|(n, _)| n == name).map(|(_, f)| f)
}

/// Insert keyed by name, keeping the original position on replacement.
fn upsert(fields: &mut Vec<(String, Field)>, name: String, field: Field) {
    match fields.iter_mut().find(|(n, _)| *n == name) {
        Some(slot) => slot.1 = field,
        None => fields.push((name, field)),
    }
}
