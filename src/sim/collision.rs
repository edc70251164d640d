//! Collision resolution for the collector variant
//!
//! Actor vs. entity contacts are plain AABB overlaps. The resolver classifies
//! each contact, applies its effect to the field, and removes the entity so it
//! can never be resolved twice.

use glam::Vec2;

use super::state::{CollectorField, Entity, EntityCategory};
use crate::settings::CollectorTuning;

/// Effect of a single resolved contact
#[derive(Debug, Clone, PartialEq)]
pub enum Contact {
    /// Reward or bonus collected
    Collected {
        category: EntityCategory,
        value: f64,
        /// Score after the collection
        score: f64,
        /// Live hazards within the proximity threshold at collection time
        nearby_hazards: usize,
    },
    /// Hazard struck the actor
    HazardHit {
        /// Health after the hit
        health: f64,
        /// Top-left of the hazard at impact
        position: Vec2,
    },
}

impl Contact {
    pub fn is_risky(&self) -> bool {
        matches!(self, Contact::Collected { nearby_hazards, .. } if *nearby_hazards > 0)
    }
}

/// Count hazards (other than `subject`) within `threshold` on both axes
///
/// Distances are measured between top-left corners.
pub fn nearby_hazards(entities: &[Entity], subject: &Entity, threshold: f32) -> usize {
    entities
        .iter()
        .filter(|e| e.id != subject.id && e.category.is_hazard())
        .filter(|e| {
            let d = (e.pos - subject.pos).abs();
            d.x < threshold && d.y < threshold
        })
        .count()
}

/// Resolve every actor/entity overlap, in ascending entity ID order
///
/// Resolved entities are removed from the field before the next contact is
/// examined, so proximity counts only consider still-live entities.
pub fn resolve_contacts(field: &mut CollectorField, tuning: &CollectorTuning) -> Vec<Contact> {
    let actor = field.actor.bounds();
    let mut hits: Vec<u32> = field
        .entities
        .iter()
        .filter(|e| e.bounds().overlaps(&actor))
        .map(|e| e.id)
        .collect();
    hits.sort_unstable();

    let mut contacts = Vec::with_capacity(hits.len());
    for id in hits {
        let Some(index) = field.entities.iter().position(|e| e.id == id) else {
            continue;
        };
        let entity = field.entities.remove(index);

        let contact = if entity.category.is_hazard() {
            field.health = (field.health - tuning.hazard_damage).max(0.0);
            Contact::HazardHit {
                health: field.health,
                position: entity.pos,
            }
        } else {
            field.score += entity.value;
            Contact::Collected {
                category: entity.category,
                value: entity.value,
                score: field.score,
                nearby_hazards: nearby_hazards(&field.entities, &entity, tuning.proximity_threshold),
            }
        };
        log::trace!("Contact with entity {}: {:?}", entity.id, contact);
        contacts.push(contact);
    }
    contacts
}

/// Drop entities that have fallen past the bottom edge; returns how many
pub fn discard_fallen(field: &mut CollectorField) -> usize {
    let before = field.entities.len();
    let floor = field.height;
    field.entities.retain(|e| e.pos.y <= floor);
    before - field.entities.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field() -> (CollectorField, CollectorTuning) {
        let tuning = CollectorTuning::default();
        (CollectorField::new(&tuning), tuning)
    }

    /// Place an entity so it overlaps the actor
    fn on_actor(field: &CollectorField, id: u32, category: EntityCategory) -> Entity {
        let mut e = Entity::new(id, category, field.actor.x - 10.0);
        e.pos.y = field.actor.y;
        e
    }

    #[test]
    fn test_collect_reward_adds_score() {
        let (mut field, tuning) = field();
        field.entities.push(on_actor(&field, 1, EntityCategory::Reward));

        let contacts = resolve_contacts(&mut field, &tuning);
        assert_eq!(contacts.len(), 1);
        assert_eq!(field.score, 10.0);
        assert!(field.entities.is_empty());
        assert!(!contacts[0].is_risky());
    }

    #[test]
    fn test_risky_collection_counts_nearby_hazard() {
        let (mut field, tuning) = field();
        let bonus = on_actor(&field, 1, EntityCategory::Bonus);
        // Hazard just above the bonus, not touching the actor
        let mut hazard = Entity::new(2, EntityCategory::Hazard, bonus.pos.x + 30.0);
        hazard.pos.y = bonus.pos.y - 70.0;
        field.entities.push(bonus);
        field.entities.push(hazard);

        let contacts = resolve_contacts(&mut field, &tuning);
        match &contacts[0] {
            Contact::Collected {
                nearby_hazards,
                score,
                ..
            } => {
                assert_eq!(*nearby_hazards, 1);
                assert_eq!(*score, 25.0);
            }
            other => panic!("unexpected contact {other:?}"),
        }
        assert!(contacts[0].is_risky());
        assert_eq!(field.entities.len(), 1);
    }

    #[test]
    fn test_hazard_health_clamped_at_zero() {
        let (mut field, tuning) = field();
        field.health = 10.0;
        field.entities.push(on_actor(&field, 1, EntityCategory::Hazard));

        let contacts = resolve_contacts(&mut field, &tuning);
        assert_eq!(field.health, 0.0);
        assert!(matches!(contacts[0], Contact::HazardHit { health, .. } if health == 0.0));
    }

    #[test]
    fn test_contacts_resolved_in_id_order() {
        let (mut field, tuning) = field();
        field.entities.push(on_actor(&field, 7, EntityCategory::Hazard));
        field.entities.push(on_actor(&field, 3, EntityCategory::Reward));

        let contacts = resolve_contacts(&mut field, &tuning);
        // The reward (id 3) resolves first and still sees the live hazard
        assert!(matches!(contacts[0], Contact::Collected { nearby_hazards: 1, .. }));
        assert!(matches!(contacts[1], Contact::HazardHit { .. }));
        assert!(resolve_contacts(&mut field, &tuning).is_empty());
    }

    #[test]
    fn test_far_hazard_is_not_nearby() {
        let (field, _) = field();
        let reward = on_actor(&field, 1, EntityCategory::Reward);
        let mut hazard = Entity::new(2, EntityCategory::Hazard, reward.pos.x + 80.0);
        hazard.pos.y = reward.pos.y;
        assert_eq!(nearby_hazards(&[hazard], &reward, 80.0), 0);
    }

    #[test]
    fn test_discard_fallen() {
        let (mut field, _) = field();
        let mut low = Entity::new(1, EntityCategory::Reward, 100.0);
        low.pos.y = field.height + 1.0;
        field.entities.push(low);
        field.entities.push(Entity::new(2, EntityCategory::Reward, 100.0));

        assert_eq!(discard_fallen(&mut field), 1);
        assert_eq!(field.entities[0].id, 2);
        assert_eq!(field.score, 0.0);
    }
}
