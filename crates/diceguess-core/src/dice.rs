use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::GameError;

/// One entry of the die catalog: the face value it shows and the resource the
/// scene layer instantiates for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DieDescriptor {
    pub value: u32,
    pub resource_path: String,
}

/// The pool dice are drawn from, uniformly and independently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DieCatalog {
    dice: Vec<DieDescriptor>,
}

impl DieCatalog {
    pub fn new(dice: Vec<DieDescriptor>) -> Self {
        Self { dice }
    }

    /// A six-sided die pool with faces 1 through 6.
    pub fn standard_d6() -> Self {
        Self::new(
            (1..=6)
                .map(|value| DieDescriptor {
                    value,
                    resource_path: format!("Dice/D6_{value}"),
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.dice.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dice.is_empty()
    }

    /// Draw one die uniformly at random.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<&DieDescriptor, GameError> {
        if self.dice.is_empty() {
            return Err(GameError::ConfigurationMissing("die catalog is empty".into()));
        }
        Ok(&self.dice[rng.random_range(0..self.dice.len())])
    }
}

/// A point on the dice table plane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpawnPoint {
    pub x: f32,
    pub y: f32,
}

impl SpawnPoint {
    pub fn distance(self, other: SpawnPoint) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// A die spawned for the current round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiceValue {
    pub value: u32,
    pub resource_path: String,
    pub position: SpawnPoint,
    /// Rotation around the table normal, in degrees.
    pub rotation_deg: f32,
}

/// Circular area dice are scattered over.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnArea {
    pub center: SpawnPoint,
    pub radius: f32,
    pub min_distance: f32,
    pub max_attempts: u32,
}

impl Default for SpawnArea {
    fn default() -> Self {
        Self {
            center: SpawnPoint::default(),
            radius: 2.0,
            min_distance: 1.0,
            max_attempts: 100,
        }
    }
}

impl SpawnArea {
    /// Find a point inside the area at least `min_distance` away from every
    /// point in `used`, trying at most `max_attempts` candidates.
    pub fn find_position<R: Rng + ?Sized>(
        &self,
        used: &[SpawnPoint],
        rng: &mut R,
    ) -> Result<SpawnPoint, GameError> {
        for _ in 0..self.max_attempts {
            let candidate = self.sample(rng);
            if used
                .iter()
                .all(|p| p.distance(candidate) >= self.min_distance)
            {
                return Ok(candidate);
            }
        }
        Err(GameError::SpawnPositionExhausted {
            attempts: self.max_attempts,
        })
    }

    /// Uniform sample inside the disc.
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> SpawnPoint {
        let r = self.radius * rng.random::<f32>().sqrt();
        let theta = rng.random::<f32>() * std::f32::consts::TAU;
        SpawnPoint {
            x: self.center.x + r * theta.cos(),
            y: self.center.y + r * theta.sin(),
        }
    }
}

/// Spawn `count` dice for a round.
///
/// A missing catalog skips that die (the round proceeds with fewer dice); an
/// exhausted position search falls back to the area center.
pub fn roll_dice<R: Rng + ?Sized>(
    catalog: &DieCatalog,
    count: u32,
    area: &SpawnArea,
    rng: &mut R,
) -> Vec<DiceValue> {
    let mut used: Vec<SpawnPoint> = Vec::new();
    let mut dice = Vec::new();

    for index in 0..count {
        let die = match catalog.pick(rng) {
            Ok(die) => die,
            Err(e) => {
                tracing::warn!(index, error = %e, "skipping die");
                continue;
            },
        };
        let position = match area.find_position(&used, rng) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(index, error = %e, "spawn position fallback to center");
                area.center
            },
        };
        used.push(position);
        dice.push(DiceValue {
            value: die.value,
            resource_path: die.resource_path.clone(),
            position,
            rotation_deg: rng.random_range(0.0..360.0),
        });
    }

    dice
}

/// The authoritative answer for a set of dice: the product of their faces.
/// An empty set yields 1.
pub fn product(dice: &[DiceValue]) -> i64 {
    dice.iter()
        .fold(1i64, |acc, d| acc.saturating_mul(i64::from(d.value)))
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn die(value: u32) -> DiceValue {
        DiceValue {
            value,
            resource_path: format!("Dice/D6_{value}"),
            position: SpawnPoint::default(),
            rotation_deg: 0.0,
        }
    }

    #[test]
    fn product_of_faces() {
        assert_eq!(product(&[die(2), die(3), die(4)]), 24);
        assert_eq!(product(&[die(6)]), 6);
        assert_eq!(product(&[]), 1);
    }

    #[test]
    fn roll_spawns_requested_count_from_catalog() {
        let catalog = DieCatalog::standard_d6();
        let mut rng = StdRng::seed_from_u64(7);
        let dice = roll_dice(&catalog, 5, &SpawnArea::default(), &mut rng);
        assert_eq!(dice.len(), 5);
        for d in &dice {
            assert!((1..=6).contains(&d.value));
            assert!((0.0..360.0).contains(&d.rotation_deg));
            assert!(d.position.distance(SpawnPoint::default()) <= 2.0 + 1e-4);
        }
    }

    #[test]
    fn roll_with_empty_catalog_degrades_to_no_dice() {
        let mut rng = StdRng::seed_from_u64(1);
        let dice = roll_dice(&DieCatalog::default(), 3, &SpawnArea::default(), &mut rng);
        assert!(dice.is_empty());
        assert_eq!(product(&dice), 1);
    }

    #[test]
    fn spawned_positions_respect_min_distance_when_room_allows() {
        let area = SpawnArea {
            radius: 10.0,
            ..SpawnArea::default()
        };
        let mut rng = StdRng::seed_from_u64(42);
        let dice = roll_dice(&DieCatalog::standard_d6(), 4, &area, &mut rng);
        for (i, a) in dice.iter().enumerate() {
            for b in &dice[i + 1..] {
                assert!(a.position.distance(b.position) >= area.min_distance);
            }
        }
    }

    #[test]
    fn crowded_area_falls_back_to_center() {
        let area = SpawnArea {
            radius: 0.1,
            min_distance: 5.0,
            max_attempts: 10,
            ..SpawnArea::default()
        };
        let mut rng = StdRng::seed_from_u64(3);
        let used = [SpawnPoint::default()];
        assert_eq!(
            area.find_position(&used, &mut rng),
            Err(GameError::SpawnPositionExhausted { attempts: 10 })
        );

        let dice = roll_dice(&DieCatalog::standard_d6(), 3, &area, &mut rng);
        assert_eq!(dice.len(), 3);
        // First die lands anywhere in the tiny disc; the rest are forced to center.
        assert_eq!(dice[1].position, area.center);
        assert_eq!(dice[2].position, area.center);
    }

    #[test]
    fn empty_catalog_pick_is_configuration_missing() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            DieCatalog::default().pick(&mut rng),
            Err(GameError::ConfigurationMissing(_))
        ));
    }
}
