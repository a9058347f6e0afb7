//! Entity relationship graph and join resolution.
//!
//! A [`RelationshipRegistry`] declares how one parent table reaches its
//! related tables. Dotted column references in a query description
//! (`tags.name`, `tags.parent.name`) are resolved against the registry into
//! a deduplicated list of LEFT JOIN clauses; a [`RegistryManager`] links
//! registries so a path can hop across tables.
//!
//! Registries and the manager are assembled during startup wiring and never
//! mutated afterwards, so they are shared by reference across request
//! handlers without synchronization.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, warn};

use super::types::{QueryOptions, Value};

/// One SQL JOIN clause produced by relationship resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinConfig {
    /// Table being joined.
    pub table: String,
    /// Alias for the joined table, when the join needs one.
    pub alias: Option<String>,
    /// Raw ON condition. Built from wiring-time configuration, never from
    /// request values.
    pub condition: String,
}

impl JoinConfig {
    fn plain(table: &str, condition: String) -> Self {
        Self {
            table: table.to_string(),
            alias: None,
            condition,
        }
    }

    fn aliased(table: &str, alias: String, condition: String) -> Self {
        Self {
            table: table.to_string(),
            alias: Some(alias),
            condition,
        }
    }

    /// The name this join answers to in the query: the alias when present,
    /// otherwise the table itself. Deduplication keys on this.
    pub fn target(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table)
    }
}

/// A fixed `column operator value` condition attached to a relationship's
/// join clause (`photos.deleted = FALSE` and the like).
#[derive(Debug, Clone, PartialEq)]
pub struct StaticCondition {
    pub column: String,
    pub operator: String,
    pub value: Value,
}

impl StaticCondition {
    pub fn new(
        column: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            column: column.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }

    fn render(&self) -> String {
        format!("{} {} {}", self.column, self.operator, self.value.sql_literal())
    }
}

/// A declared edge from a parent table to a related table.
#[derive(Debug, Clone)]
pub enum Relationship {
    /// Rows of `table` point back at the parent: `table.fk = parent.id`.
    OneToMany {
        table: String,
        foreign_key: String,
        conditions: Vec<StaticCondition>,
    },
    /// The parent points at one row of `table`: `table.id = parent.fk`.
    ManyToOne {
        table: String,
        foreign_key: String,
        conditions: Vec<StaticCondition>,
    },
    /// Link through a junction table: `junction.junction_key = parent.id`,
    /// then `table.id = junction.target_key`.
    ManyToMany {
        table: String,
        junction: String,
        junction_key: String,
        target_key: String,
        conditions: Vec<StaticCondition>,
    },
    /// The parent table joined to itself under a generated alias,
    /// depth-bounded for chained references.
    SelfReferential {
        table: String,
        foreign_key: String,
        max_depth: u32,
        conditions: Vec<StaticCondition>,
    },
    /// The target table is picked at resolution time by mapping the value
    /// of a discriminator column through `variants`.
    Polymorphic {
        type_column: String,
        id_column: String,
        variants: HashMap<String, String>,
        conditions: Vec<StaticCondition>,
    },
}

impl Relationship {
    pub fn one_to_many(table: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Relationship::OneToMany {
            table: table.into(),
            foreign_key: foreign_key.into(),
            conditions: Vec::new(),
        }
    }

    pub fn many_to_one(table: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Relationship::ManyToOne {
            table: table.into(),
            foreign_key: foreign_key.into(),
            conditions: Vec::new(),
        }
    }

    pub fn many_to_many(
        table: impl Into<String>,
        junction: impl Into<String>,
        junction_key: impl Into<String>,
        target_key: impl Into<String>,
    ) -> Self {
        Relationship::ManyToMany {
            table: table.into(),
            junction: junction.into(),
            junction_key: junction_key.into(),
            target_key: target_key.into(),
            conditions: Vec::new(),
        }
    }

    pub fn self_referential(
        table: impl Into<String>,
        foreign_key: impl Into<String>,
        max_depth: u32,
    ) -> Self {
        Relationship::SelfReferential {
            table: table.into(),
            foreign_key: foreign_key.into(),
            max_depth,
            conditions: Vec::new(),
        }
    }

    pub fn polymorphic<I, K, V>(
        type_column: impl Into<String>,
        id_column: impl Into<String>,
        variants: I,
    ) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Relationship::Polymorphic {
            type_column: type_column.into(),
            id_column: id_column.into(),
            variants: variants
                .into_iter()
                .map(|(name, table)| (name.into(), table.into()))
                .collect(),
            conditions: Vec::new(),
        }
    }

    /// Attach a static condition to the relationship's join clause. For
    /// many-to-many this lands on the target join, not the junction.
    #[must_use]
    pub fn with_condition(mut self, condition: StaticCondition) -> Self {
        match &mut self {
            Relationship::OneToMany { conditions, .. }
            | Relationship::ManyToOne { conditions, .. }
            | Relationship::ManyToMany { conditions, .. }
            | Relationship::SelfReferential { conditions, .. }
            | Relationship::Polymorphic { conditions, .. } => conditions.push(condition),
        }
        self
    }
}

/// Relationship catalog for one parent table.
#[derive(Debug, Clone)]
pub struct RelationshipRegistry {
    table: String,
    relations: BTreeMap<String, Relationship>,
}

impl RelationshipRegistry {
    /// Start a registry for `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            relations: BTreeMap::new(),
        }
    }

    /// Declare a named relationship. Builder-style; the registry is
    /// complete once wiring hands it out.
    #[must_use]
    pub fn relation(mut self, name: impl Into<String>, relationship: Relationship) -> Self {
        self.relations.insert(name.into(), relationship);
        self
    }

    /// The parent table this registry describes.
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn get(&self, name: &str) -> Option<&Relationship> {
        self.relations.get(name)
    }

    /// Resolve every dotted column reference in `options` into LEFT JOIN
    /// clauses, deduplicated across the whole call. Without a manager,
    /// paths cannot hop past this registry's own relationships.
    pub fn generate_joins(&self, options: &QueryOptions) -> Vec<JoinConfig> {
        self.resolve(options, None)
    }

    pub(crate) fn resolve(
        &self,
        options: &QueryOptions,
        manager: Option<&RegistryManager>,
    ) -> Vec<JoinConfig> {
        let mut joins = Vec::new();
        let mut seen = HashSet::new();
        for path in reference_paths(options) {
            self.walk_path(&path, options, manager, &mut joins, &mut seen);
        }
        debug!(
            table = %self.table,
            joins = joins.len(),
            "resolved relationship joins"
        );
        joins
    }

    fn walk_path<'a>(
        &'a self,
        path: &str,
        options: &QueryOptions,
        manager: Option<&'a RegistryManager>,
        joins: &mut Vec<JoinConfig>,
        seen: &mut HashSet<String>,
    ) {
        let mut registry = self;
        let mut self_hops: u32 = 0;
        for segment in path.split('.') {
            let Some(relationship) = registry.get(segment) else {
                debug!(
                    table = %registry.table,
                    segment,
                    "no relationship for path segment; stopping walk"
                );
                return;
            };

            if let Relationship::SelfReferential { max_depth, .. } = relationship {
                self_hops += 1;
                if self_hops > *max_depth {
                    warn!(
                        table = %registry.table,
                        segment,
                        max_depth = *max_depth,
                        "self-referential chain exceeds its depth bound; stopping walk"
                    );
                    return;
                }
            } else {
                self_hops = 0;
            }

            let Some(next_table) = registry.emit(segment, relationship, options, joins, seen)
            else {
                return;
            };

            if next_table != registry.table {
                match manager.and_then(|m| m.registry(&next_table)) {
                    Some(next) => registry = next,
                    None => {
                        debug!(
                            table = %next_table,
                            "no registry for join target; stopping walk"
                        );
                        return;
                    }
                }
            }
        }
    }

    /// Emit the join clause(s) for one resolved relationship and return the
    /// table the walk continues from, or `None` when the walk cannot
    /// continue (unresolvable polymorphic target).
    fn emit(
        &self,
        name: &str,
        relationship: &Relationship,
        options: &QueryOptions,
        joins: &mut Vec<JoinConfig>,
        seen: &mut HashSet<String>,
    ) -> Option<String> {
        let parent = &self.table;
        match relationship {
            Relationship::ManyToOne {
                table,
                foreign_key,
                conditions,
            } => {
                let condition = format!("{table}.id = {parent}.{foreign_key}");
                push_join(joins, seen, JoinConfig::plain(table, condition), conditions);
                Some(table.clone())
            }
            Relationship::OneToMany {
                table,
                foreign_key,
                conditions,
            } => {
                let condition = format!("{table}.{foreign_key} = {parent}.id");
                push_join(joins, seen, JoinConfig::plain(table, condition), conditions);
                Some(table.clone())
            }
            Relationship::ManyToMany {
                table,
                junction,
                junction_key,
                target_key,
                conditions,
            } => {
                let junction_condition = format!("{junction}.{junction_key} = {parent}.id");
                push_join(
                    joins,
                    seen,
                    JoinConfig::plain(junction, junction_condition),
                    &[],
                );
                let target_condition = format!("{table}.id = {junction}.{target_key}");
                push_join(
                    joins,
                    seen,
                    JoinConfig::plain(table, target_condition),
                    conditions,
                );
                Some(table.clone())
            }
            Relationship::SelfReferential {
                table,
                foreign_key,
                conditions,
                ..
            } => {
                let alias = format!("{name}_{table}");
                let condition = format!("{alias}.id = {parent}.{foreign_key}");
                push_join(
                    joins,
                    seen,
                    JoinConfig::aliased(table, alias, condition),
                    conditions,
                );
                Some(table.clone())
            }
            Relationship::Polymorphic {
                type_column,
                id_column,
                variants,
                conditions,
            } => {
                let Some(type_name) = discriminator_value(options, type_column) else {
                    warn!(
                        relationship = name,
                        column = %type_column,
                        "polymorphic reference without a discriminator filter; no join emitted"
                    );
                    return None;
                };
                let Some(table) = variants.get(&type_name) else {
                    warn!(
                        relationship = name,
                        value = %type_name,
                        "unmapped polymorphic discriminator; no join emitted"
                    );
                    return None;
                };
                let condition = format!("{table}.id = {parent}.{id_column}");
                push_join(joins, seen, JoinConfig::plain(table, condition), conditions);
                Some(table.clone())
            }
        }
    }
}

/// Catalog of registries keyed by table, enabling multi-hop paths.
#[derive(Debug, Clone, Default)]
pub struct RegistryManager {
    registries: HashMap<String, RelationshipRegistry>,
}

impl RegistryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table's registry. Builder-style: the manager is assembled once
    /// at startup and read-only afterwards.
    #[must_use]
    pub fn register(mut self, registry: RelationshipRegistry) -> Self {
        self.registries
            .insert(registry.table().to_string(), registry);
        self
    }

    pub fn registry(&self, table: &str) -> Option<&RelationshipRegistry> {
        self.registries.get(table)
    }

    /// Resolve joins for `table`, hopping across registries as its paths
    /// demand. Unknown tables resolve to no joins.
    pub fn generate_joins(&self, table: &str, options: &QueryOptions) -> Vec<JoinConfig> {
        match self.registry(table) {
            Some(registry) => registry.resolve(options, Some(self)),
            None => {
                debug!(table, "no registry for table; no joins resolved");
                Vec::new()
            }
        }
    }
}

fn push_join(
    joins: &mut Vec<JoinConfig>,
    seen: &mut HashSet<String>,
    mut join: JoinConfig,
    conditions: &[StaticCondition],
) {
    if !seen.insert(join.target().to_string()) {
        return;
    }
    for condition in conditions {
        join.condition.push_str(" AND ");
        join.condition.push_str(&condition.render());
    }
    joins.push(join);
}

/// Look up a polymorphic discriminator value in the description's filters:
/// the `filter` map first, then any `eq` condition on the same column.
fn discriminator_value(options: &QueryOptions, type_column: &str) -> Option<String> {
    if let Some(Value::Str(name)) = options.filter.get(type_column) {
        return Some(name.clone());
    }
    options.filter_conditions.iter().find_map(|condition| {
        if condition.column == type_column && condition.operator == "eq" {
            if let Value::Str(name) = &condition.value {
                return Some(name.clone());
            }
        }
        None
    })
}

/// Distinct relationship paths referenced by the description, in
/// first-appearance order across `filter`, `filter_or`,
/// `filter_conditions`, `search`, and `order`. A reference's path is
/// everything before its final segment; references without a dot have no
/// path.
fn reference_paths(options: &QueryOptions) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut collect = |column: &str| {
        if let Some((path, _)) = column.rsplit_once('.') {
            if seen.insert(path.to_string()) {
                paths.push(path.to_string());
            }
        }
    };
    for column in options.filter.keys() {
        collect(column);
    }
    for column in options.filter_or.keys() {
        collect(column);
    }
    for condition in &options.filter_conditions {
        collect(&condition.column);
    }
    for column in options.search.keys() {
        collect(column);
    }
    for (column, _) in &options.order {
        collect(column);
    }
    paths
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
