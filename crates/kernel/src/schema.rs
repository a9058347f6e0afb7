//! Entity graph and listing rules for the diario data model.
//!
//! Everything here is wiring-time configuration: the process builds the
//! relationship graph and the per-endpoint rules once at startup and shares
//! them read-only with request handlers. Relationship names deliberately
//! match their target table names so dotted references like `tags.name`
//! qualify against the table the join introduces.

use crate::listing::{
    QueryRules, RegistryManager, Relationship, RelationshipRegistry, StaticCondition,
};

/// The full diario relationship graph.
///
/// Activities (journal entries) reach their owner, their tags through the
/// `activity_tags` junction, and their photos and comments. Comments thread
/// through a self-referential parent link and attach polymorphically to an
/// activity or a photo. Tags nest one level of hierarchy.
pub fn relationship_graph() -> RegistryManager {
    RegistryManager::new()
        .register(
            RelationshipRegistry::new("activities")
                .relation("users", Relationship::many_to_one("users", "user_id"))
                .relation(
                    "tags",
                    Relationship::many_to_many("tags", "activity_tags", "activity_id", "tag_id"),
                )
                .relation(
                    "photos",
                    Relationship::one_to_many("photos", "activity_id")
                        .with_condition(StaticCondition::new("photos.deleted", "=", false)),
                )
                .relation(
                    "comments",
                    Relationship::one_to_many("comments", "activity_id"),
                ),
        )
        .register(
            RelationshipRegistry::new("photos")
                .relation(
                    "activities",
                    Relationship::many_to_one("activities", "activity_id"),
                ),
        )
        .register(
            RelationshipRegistry::new("comments")
                .relation(
                    "parent",
                    Relationship::self_referential("comments", "parent_id", 3),
                )
                .relation("users", Relationship::many_to_one("users", "author_id"))
                .relation(
                    "commentable",
                    Relationship::polymorphic(
                        "commentable_type",
                        "commentable_id",
                        [("Activity", "activities"), ("Photo", "photos")],
                    ),
                ),
        )
        .register(
            RelationshipRegistry::new("tags").relation(
                "parent",
                Relationship::self_referential("tags", "parent_id", 2),
            ),
        )
        .register(RelationshipRegistry::new("users"))
}

/// Listing rules for `GET /activities`.
///
/// The `user_id` scope filter is mandatory so one user's journal can never
/// appear in another's listing.
pub fn activity_rules() -> QueryRules {
    QueryRules::new()
        .filterable([
            "user_id",
            "kind",
            "duration",
            "distance",
            "calories",
            "occurred_at",
            "created_at",
            "tags.name",
            "users.name",
        ])
        .searchable(["title", "notes", "tags.name"])
        .orderable(["occurred_at", "created_at", "duration", "distance", "title"])
        .allow_operators("kind", ["eq", "ne"])
        .require_scope("user_id")
}

/// Listing rules for `GET /activities/{id}/photos`.
pub fn photo_rules() -> QueryRules {
    QueryRules::new()
        .filterable(["activity_id", "taken_at", "activities.user_id"])
        .searchable(["caption"])
        .orderable(["taken_at", "created_at"])
        .max_limit(50)
}

/// Listing rules for `GET /tags`.
pub fn tag_rules() -> QueryRules {
    QueryRules::new()
        .filterable(["user_id", "name"])
        .searchable(["name"])
        .orderable(["name", "created_at"])
        .require_scope("user_id")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
