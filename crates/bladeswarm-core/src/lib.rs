//! Core simulation types and the tick pipeline for the bladeswarm workspace.

use bladeswarm_index::{NeighborhoodIndex, PairwiseIndex, UniformGridIndex};
use ordered_float::OrderedFloat;
use rand::{Rng, RngCore, SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, MulAssign, Sub};
use thiserror::Error;

new_key_type! {
    /// Stable handle for swarm agents backed by a generational slot map.
    pub struct AgentId;

    /// Stable handle for hazards tracked by the world.
    pub struct HazardId;
}

/// Planar vector used for positions, velocities, and steering forces.
///
/// Value semantics throughout: every operation returns a new vector, except
/// the `+=`/`*=` overloads used on hot per-tick accumulators.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    /// The zero vector.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Direction at `angle` radians scaled by `magnitude`.
    #[must_use]
    pub fn from_angle(angle: f32, magnitude: f32) -> Self {
        Self::new(angle.cos() * magnitude, angle.sin() * magnitude)
    }

    /// Squared Euclidean length.
    #[must_use]
    pub fn magnitude_sq(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    /// Euclidean length.
    #[must_use]
    pub fn magnitude(self) -> f32 {
        self.magnitude_sq().sqrt()
    }

    /// Unit vector with the same direction, or zero when the length is zero.
    #[must_use]
    pub fn normalized(self) -> Self {
        let magnitude = self.magnitude();
        if magnitude > 0.0 {
            self * (1.0 / magnitude)
        } else {
            Self::ZERO
        }
    }

    /// Same direction with the length clamped to `max`. Vectors already at or
    /// under the limit are returned unchanged.
    #[must_use]
    pub fn limit(self, max: f32) -> Self {
        if self.magnitude_sq() > max * max {
            self.normalized() * max
        } else {
            self
        }
    }

    /// Squared distance to `other`.
    #[must_use]
    pub fn distance_sq_to(self, other: Self) -> f32 {
        (self - other).magnitude_sq()
    }

    /// Distance to `other`.
    #[must_use]
    pub fn distance_to(self, other: Self) -> f32 {
        self.distance_sq_to(other).sqrt()
    }
}

impl Add for Vec2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl MulAssign<f32> for Vec2 {
    fn mul_assign(&mut self, rhs: f32) {
        self.x *= rhs;
        self.y *= rhs;
    }
}

/// Monotonic simulation tick counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Tick(pub u64);

impl Tick {
    /// The tick before any update has run.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    /// The tick that follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Per-agent movement limits and steering radii, copied from the
/// configuration at spawn time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentTraits {
    /// Hard cap on speed in world units per tick.
    pub max_speed: f32,
    /// Hard cap on steering force magnitude per tick.
    pub max_force: f32,
    /// Bounding box side used for platform collision.
    pub size: f32,
    /// Neighbor radius for the separation rule.
    pub separation_radius: f32,
    /// Neighbor radius for the alignment rule.
    pub alignment_radius: f32,
    /// Neighbor radius for the cohesion rule.
    pub cohesion_radius: f32,
}

impl Default for AgentTraits {
    fn default() -> Self {
        Self {
            max_speed: 6.0,
            max_force: 0.25,
            size: 16.0,
            separation_radius: 30.0,
            alignment_radius: 50.0,
            cohesion_radius: 50.0,
        }
    }
}

/// Scalar state for a single agent. Acceleration is a per-tick scratch
/// accumulator and is zero between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentData {
    /// World position.
    pub position: Vec2,
    /// Velocity in world units per tick.
    pub velocity: Vec2,
    /// Steering force accumulated for the current tick.
    pub acceleration: Vec2,
    /// Movement limits and steering radii.
    pub traits: AgentTraits,
}

impl AgentData {
    /// Agent at rest at `position` with the provided limits.
    #[must_use]
    pub const fn new(position: Vec2, traits: AgentTraits) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            acceleration: Vec2::ZERO,
            traits,
        }
    }
}

/// Struct-of-arrays storage for agent scalars.
#[derive(Debug, Clone, Default)]
pub struct AgentColumns {
    positions: Vec<Vec2>,
    velocities: Vec<Vec2>,
    accelerations: Vec<Vec2>,
    traits: Vec<AgentTraits>,
}

impl AgentColumns {
    /// Create empty columns.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns true when no rows are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Append a row holding `agent`.
    pub fn push(&mut self, agent: AgentData) {
        self.positions.push(agent.position);
        self.velocities.push(agent.velocity);
        self.accelerations.push(agent.acceleration);
        self.traits.push(agent.traits);
        self.debug_assert_coherent();
    }

    /// Swap-remove the row at `index` and return its scalar fields.
    pub fn swap_remove(&mut self, index: usize) -> AgentData {
        let removed = AgentData {
            position: self.positions.swap_remove(index),
            velocity: self.velocities.swap_remove(index),
            acceleration: self.accelerations.swap_remove(index),
            traits: self.traits.swap_remove(index),
        };
        self.debug_assert_coherent();
        removed
    }

    /// Return a copy of the scalar fields at `index`.
    #[must_use]
    pub fn snapshot(&self, index: usize) -> AgentData {
        AgentData {
            position: self.positions[index],
            velocity: self.velocities[index],
            acceleration: self.accelerations[index],
            traits: self.traits[index],
        }
    }

    /// Immutable access to the positions column.
    #[must_use]
    pub fn positions(&self) -> &[Vec2] {
        &self.positions
    }

    /// Mutable access to the positions column.
    #[must_use]
    pub fn positions_mut(&mut self) -> &mut [Vec2] {
        &mut self.positions
    }

    /// Immutable access to the velocities column.
    #[must_use]
    pub fn velocities(&self) -> &[Vec2] {
        &self.velocities
    }

    /// Mutable access to the velocities column.
    #[must_use]
    pub fn velocities_mut(&mut self) -> &mut [Vec2] {
        &mut self.velocities
    }

    /// Immutable access to the acceleration scratch column.
    #[must_use]
    pub fn accelerations(&self) -> &[Vec2] {
        &self.accelerations
    }

    /// Mutable access to the acceleration scratch column.
    #[must_use]
    pub fn accelerations_mut(&mut self) -> &mut [Vec2] {
        &mut self.accelerations
    }

    /// Immutable access to the movement limits column.
    #[must_use]
    pub fn traits(&self) -> &[AgentTraits] {
        &self.traits
    }

    #[inline]
    fn debug_assert_coherent(&self) {
        debug_assert_eq!(self.positions.len(), self.velocities.len());
        debug_assert_eq!(self.positions.len(), self.accelerations.len());
        debug_assert_eq!(self.positions.len(), self.traits.len());
    }
}

/// Dense SoA storage with generational handles for agent access.
#[derive(Debug)]
pub struct AgentArena {
    slots: SlotMap<AgentId, usize>,
    handles: Vec<AgentId>,
    columns: AgentColumns,
}

impl Default for AgentArena {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: SlotMap::with_key(),
            handles: Vec::new(),
            columns: AgentColumns::new(),
        }
    }

    /// Number of active agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true when no agents are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Iterate over active agent handles in dense iteration order.
    pub fn iter_handles(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.handles.iter().copied()
    }

    /// Borrow the underlying column storage.
    #[must_use]
    pub fn columns(&self) -> &AgentColumns {
        &self.columns
    }

    /// Mutably borrow the underlying column storage.
    #[must_use]
    pub fn columns_mut(&mut self) -> &mut AgentColumns {
        &mut self.columns
    }

    /// Returns the dense index for `id`, if present.
    #[must_use]
    pub fn index_of(&self, id: AgentId) -> Option<usize> {
        self.slots.get(id).copied()
    }

    /// Returns true if `id` refers to a live agent.
    #[must_use]
    pub fn contains(&self, id: AgentId) -> bool {
        self.slots.contains_key(id)
    }

    /// Insert a new agent and return its handle.
    pub fn insert(&mut self, agent: AgentData) -> AgentId {
        let index = self.columns.len();
        self.columns.push(agent);
        let id = self.slots.insert(index);
        self.handles.push(id);
        id
    }

    /// Remove `id` returning its scalar data if it was present.
    pub fn remove(&mut self, id: AgentId) -> Option<AgentData> {
        let index = self.slots.remove(id)?;
        let removed = self.columns.swap_remove(index);
        let removed_handle = self.handles.swap_remove(index);
        debug_assert_eq!(removed_handle, id);
        if index < self.handles.len() {
            let moved = self.handles[index];
            if let Some(slot) = self.slots.get_mut(moved) {
                *slot = index;
            }
        }
        Some(removed)
    }

    /// Produce a copy of the scalar data for `id`.
    #[must_use]
    pub fn snapshot(&self, id: AgentId) -> Option<AgentData> {
        let index = self.index_of(id)?;
        Some(self.columns.snapshot(index))
    }
}

/// Relative strength of each steering rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SteeringWeights {
    /// Push away from close neighbors.
    pub separation: f32,
    /// Match nearby neighbor velocities.
    pub alignment: f32,
    /// Pull toward the local center of mass.
    pub cohesion: f32,
    /// Pull toward the cursor target.
    pub seek: f32,
}

impl Default for SteeringWeights {
    fn default() -> Self {
        Self {
            separation: 2.0,
            alignment: 1.0,
            cohesion: 1.0,
            seek: 1.5,
        }
    }
}

/// Canonical steering primitive: desired velocity toward `target` at
/// `max_speed`, minus the current velocity, clamped to `max_force`.
#[must_use]
pub fn seek(position: Vec2, velocity: Vec2, target: Vec2, max_speed: f32, max_force: f32) -> Vec2 {
    let desired = (target - position).normalized() * max_speed;
    (desired - velocity).limit(max_force)
}

/// Steer toward moving along `heading` at full speed.
fn steer_along(heading: Vec2, velocity: Vec2, max_speed: f32, max_force: f32) -> Vec2 {
    let desired = heading.normalized() * max_speed;
    (desired - velocity).limit(max_force)
}

/// Combined steering force for the agent at `idx`, evaluated against the
/// previous tick's positions and velocities.
fn flocking_force(
    idx: usize,
    positions: &[Vec2],
    velocities: &[Vec2],
    traits: &[AgentTraits],
    index: &dyn NeighborhoodIndex,
    cursor_target: Vec2,
    weights: &SteeringWeights,
) -> Vec2 {
    let position = positions[idx];
    let velocity = velocities[idx];
    let limits = traits[idx];

    let separation_sq = limits.separation_radius * limits.separation_radius;
    let alignment_sq = limits.alignment_radius * limits.alignment_radius;
    let cohesion_sq = limits.cohesion_radius * limits.cohesion_radius;
    let query_sq = separation_sq.max(alignment_sq).max(cohesion_sq);

    let mut separation_sum = Vec2::ZERO;
    let mut separation_count = 0u32;
    let mut alignment_sum = Vec2::ZERO;
    let mut alignment_count = 0u32;
    let mut cohesion_sum = Vec2::ZERO;
    let mut cohesion_count = 0u32;

    index.neighbors_within(idx, query_sq, &mut |other: usize, dist_sq: OrderedFloat<f32>| {
        let dist_sq = dist_sq.into_inner();
        // A coincident neighbor has no usable away direction.
        if dist_sq < separation_sq && dist_sq > 0.0 {
            let dist = dist_sq.sqrt();
            separation_sum += (position - positions[other]).normalized() * (1.0 / dist);
            separation_count += 1;
        }
        if dist_sq <= alignment_sq {
            alignment_sum += velocities[other];
            alignment_count += 1;
        }
        if dist_sq <= cohesion_sq {
            cohesion_sum += positions[other];
            cohesion_count += 1;
        }
    });

    let mut force = Vec2::ZERO;
    if separation_count > 0 {
        let heading = separation_sum * (1.0 / separation_count as f32);
        if heading.magnitude_sq() > 0.0 {
            force += steer_along(heading, velocity, limits.max_speed, limits.max_force)
                * weights.separation;
        }
    }
    if alignment_count > 0 {
        let heading = alignment_sum * (1.0 / alignment_count as f32);
        force +=
            steer_along(heading, velocity, limits.max_speed, limits.max_force) * weights.alignment;
    }
    if cohesion_count > 0 {
        let centroid = cohesion_sum * (1.0 / cohesion_count as f32);
        force += seek(position, velocity, centroid, limits.max_speed, limits.max_force)
            * weights.cohesion;
    }
    force += seek(position, velocity, cursor_target, limits.max_speed, limits.max_force)
        * weights.seek;
    force
}

/// Owns the agent collection and advances it with a consistent neighbor
/// snapshot each tick.
pub struct Swarm {
    arena: AgentArena,
    index: Box<dyn NeighborhoodIndex + Send>,
    position_scratch: Vec<(f32, f32)>,
    force_scratch: Vec<Vec2>,
}

impl fmt::Debug for Swarm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Swarm")
            .field("agent_count", &self.arena.len())
            .finish()
    }
}

impl Swarm {
    /// Create an empty swarm backed by the selected index implementation.
    #[must_use]
    pub fn new(kind: SpatialIndexKind) -> Self {
        Self {
            arena: AgentArena::new(),
            index: kind.build(),
            position_scratch: Vec::new(),
            force_scratch: Vec::new(),
        }
    }

    /// Insert a new agent and return its handle.
    pub fn insert(&mut self, agent: AgentData) -> AgentId {
        self.arena.insert(agent)
    }

    /// Remove an agent, returning its scalar state if it was present.
    pub fn remove(&mut self, id: AgentId) -> Option<AgentData> {
        self.arena.remove(id)
    }

    /// Number of live agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Returns true when the swarm holds no agents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Borrow the underlying arena.
    #[must_use]
    pub fn arena(&self) -> &AgentArena {
        &self.arena
    }

    /// Average of all agent positions, or `None` when the swarm is empty.
    #[must_use]
    pub fn center_of_mass(&self) -> Option<Vec2> {
        let positions = self.arena.columns().positions();
        if positions.is_empty() {
            return None;
        }
        let mut sum = Vec2::ZERO;
        for &position in positions {
            sum += position;
        }
        sum *= 1.0 / positions.len() as f32;
        Some(sum)
    }

    /// Advance every agent one tick: rebuild the neighbor index, compute all
    /// steering forces against the pre-tick snapshot, then commit the
    /// integrated motion. The two phases keep flocking order-independent.
    pub fn advance(&mut self, cursor_target: Vec2, weights: &SteeringWeights) {
        let count = self.arena.len();
        if count == 0 {
            return;
        }

        self.position_scratch.clear();
        self.position_scratch
            .extend(self.arena.columns().positions().iter().map(|p| (p.x, p.y)));
        // A rejected rebuild leaves the previous tick's state untouched.
        if self.index.rebuild(&self.position_scratch).is_err() {
            return;
        }

        self.force_scratch.clear();
        {
            let columns = self.arena.columns();
            let positions = columns.positions();
            let velocities = columns.velocities();
            let traits = columns.traits();
            let index = self.index.as_ref();
            self.force_scratch.extend((0..count).map(|idx| {
                flocking_force(idx, positions, velocities, traits, index, cursor_target, weights)
            }));
        }

        let columns = self.arena.columns_mut();
        for (idx, force) in self.force_scratch.iter().copied().enumerate() {
            columns.accelerations_mut()[idx] = force;
            let max_speed = columns.traits()[idx].max_speed;
            let velocity =
                (columns.velocities()[idx] + columns.accelerations()[idx]).limit(max_speed);
            columns.velocities_mut()[idx] = velocity;
            columns.positions_mut()[idx] += velocity;
            columns.accelerations_mut()[idx] = Vec2::ZERO;
        }
    }

    /// Snap agents falling through a platform's top surface onto it and zero
    /// their downward velocity. Side and bottom approaches pass through.
    pub fn resolve_platform_collisions(&mut self, platforms: &[Platform]) {
        if platforms.is_empty() {
            return;
        }
        let columns = self.arena.columns_mut();
        for idx in 0..columns.len() {
            if columns.velocities()[idx].y <= 0.0 {
                continue;
            }
            let half = columns.traits()[idx].size * 0.5;
            let position = columns.positions()[idx];
            for platform in platforms {
                let overlaps_x = position.x + half >= platform.x
                    && position.x - half <= platform.x + platform.width;
                if !overlaps_x {
                    continue;
                }
                let top = position.y - half;
                let bottom = position.y + half;
                if bottom >= platform.y && top <= platform.y {
                    columns.positions_mut()[idx].y = platform.y - half;
                    columns.velocities_mut()[idx].y = 0.0;
                    break;
                }
            }
        }
    }
}

/// Static axis-aligned rectangle agents can land on. `y` is the top surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Platform {
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Wander behavior tuning shared by every hazard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WanderParams {
    /// Constant steering force applied along the wander heading each tick.
    pub force: f32,
    /// Maximum heading perturbation in radians per shift.
    pub turn: f32,
    /// Shortest delay between heading shifts.
    pub shift_min_ms: f64,
    /// Longest delay between heading shifts.
    pub shift_max_ms: f64,
}

impl Default for WanderParams {
    fn default() -> Self {
        Self {
            force: 0.15,
            turn: 1.0,
            shift_min_ms: 1_000.0,
            shift_max_ms: 3_000.0,
        }
    }
}

/// Wandering unit with health, per-attacker hit cooldowns, and a terminal
/// dead state.
#[derive(Debug, Clone)]
pub struct Hazard {
    /// Center of the hazard circle.
    pub position: Vec2,
    /// Velocity in world units per tick.
    pub velocity: Vec2,
    /// Per-tick force accumulator.
    pub acceleration: Vec2,
    /// Hard cap on wander speed in world units per tick.
    pub max_speed: f32,
    /// Circle diameter in world units.
    pub size: f32,
    health: i32,
    max_health: i32,
    alive: bool,
    wander_angle: f32,
    next_shift_ms: f64,
    hit_flash_until_ms: f64,
    hit_cooldown_ms: f64,
    hit_flash_ms: f64,
    last_hit_by: HashMap<AgentId, f64>,
}

impl Hazard {
    /// Hazard at rest at `position` with full health. The wander heading is
    /// randomized on the first update.
    #[must_use]
    pub fn new(
        position: Vec2,
        size: f32,
        max_speed: f32,
        max_health: i32,
        hit_cooldown_ms: f64,
        hit_flash_ms: f64,
    ) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            acceleration: Vec2::ZERO,
            max_speed,
            size,
            health: max_health,
            max_health,
            alive: true,
            wander_angle: 0.0,
            next_shift_ms: 0.0,
            hit_flash_until_ms: 0.0,
            hit_cooldown_ms,
            hit_flash_ms,
            last_hit_by: HashMap::new(),
        }
    }

    /// Remaining health.
    #[must_use]
    pub const fn health(&self) -> i32 {
        self.health
    }

    /// Health ceiling set at construction.
    #[must_use]
    pub const fn max_health(&self) -> i32 {
        self.max_health
    }

    /// False once health has reached zero; never becomes true again.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.alive
    }

    /// True while the flash armed by the most recent accepted hit is fresh.
    #[must_use]
    pub fn hit_flash(&self, now_ms: f64) -> bool {
        now_ms < self.hit_flash_until_ms
    }

    /// True when `point` lies strictly inside the hazard circle.
    #[must_use]
    pub fn contains_point(&self, point: Vec2) -> bool {
        let half = self.size * 0.5;
        self.position.distance_sq_to(point) < half * half
    }

    /// Apply `amount` damage attributed to `attacker`. The hit is rejected
    /// with no state change when the hazard is dead or when the same attacker
    /// landed a hit less than the cooldown window ago. Returns whether the
    /// hit was accepted.
    pub fn take_damage(&mut self, amount: i32, attacker: AgentId, now_ms: f64) -> bool {
        if !self.alive {
            return false;
        }
        if let Some(&last) = self.last_hit_by.get(&attacker) {
            if now_ms - last < self.hit_cooldown_ms {
                return false;
            }
        }
        self.health = (self.health - amount).max(0);
        self.last_hit_by.insert(attacker, now_ms);
        self.hit_flash_until_ms = now_ms + self.hit_flash_ms;
        if self.health <= 0 {
            self.alive = false;
        }
        true
    }

    /// Advance the wander behavior one tick, clamping the position to
    /// `bounds`. Dead hazards do not move.
    pub fn update(
        &mut self,
        now_ms: f64,
        rng: &mut dyn RngCore,
        wander: WanderParams,
        bounds: Vec2,
    ) {
        if !self.alive {
            return;
        }
        if now_ms >= self.next_shift_ms {
            self.wander_angle += rng.random_range(-wander.turn..=wander.turn);
            self.next_shift_ms =
                now_ms + rng.random_range(wander.shift_min_ms..=wander.shift_max_ms);
        }
        self.acceleration += Vec2::from_angle(self.wander_angle, wander.force);
        self.velocity = (self.velocity + self.acceleration).limit(self.max_speed);
        self.position += self.velocity;
        self.acceleration = Vec2::ZERO;
        self.position.x = self.position.x.clamp(0.0, bounds.x);
        self.position.y = self.position.y.clamp(0.0, bounds.y);
    }
}

/// Top-left corner of a view of `view_extent` centered on `focus`, clamped so
/// the view stays inside `world_extent`. Floored at zero when the view is
/// larger than the world.
#[must_use]
pub fn camera_origin(focus: Vec2, view_extent: Vec2, world_extent: Vec2) -> Vec2 {
    let max_x = (world_extent.x - view_extent.x).max(0.0);
    let max_y = (world_extent.y - view_extent.y).max(0.0);
    Vec2::new(
        (focus.x - view_extent.x * 0.5).clamp(0.0, max_x),
        (focus.y - view_extent.y * 0.5).clamp(0.0, max_y),
    )
}

/// Errors that can occur when constructing world state.
#[derive(Debug, Error)]
pub enum WorldError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Selects the neighborhood index implementation backing the swarm.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum SpatialIndexKind {
    /// Exhaustive pairwise scan; the right choice for tens of agents.
    #[default]
    Exhaustive,
    /// Uniform grid with the given cell size in world units.
    UniformGrid { cell_size: f32 },
}

impl SpatialIndexKind {
    fn build(self) -> Box<dyn NeighborhoodIndex + Send> {
        match self {
            Self::Exhaustive => Box::new(PairwiseIndex::new()),
            Self::UniformGrid { cell_size } => Box::new(UniformGridIndex::new(cell_size)),
        }
    }
}

/// Static configuration for a bladeswarm world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BladeswarmConfig {
    /// Width of the world in world units.
    pub world_width: f32,
    /// Height of the world in world units.
    pub world_height: f32,
    /// Width of the tracked view in world units.
    pub view_width: f32,
    /// Height of the tracked view in world units.
    pub view_height: f32,
    /// Simulated milliseconds added to the world clock per tick.
    pub tick_ms: f64,
    /// Optional RNG seed for reproducible worlds.
    pub rng_seed: Option<u64>,
    /// Hard cap on agent speed in world units per tick.
    pub agent_max_speed: f32,
    /// Hard cap on agent steering force per tick.
    pub agent_max_force: f32,
    /// Agent bounding box side in world units.
    pub agent_size: f32,
    /// Neighbor radius for the separation rule.
    pub separation_radius: f32,
    /// Neighbor radius for the alignment rule.
    pub alignment_radius: f32,
    /// Neighbor radius for the cohesion rule.
    pub cohesion_radius: f32,
    /// Relative strength of each steering rule.
    pub steering: SteeringWeights,
    /// Neighborhood index implementation used by the swarm.
    pub spatial_index: SpatialIndexKind,
    /// Hard cap on hazard wander speed in world units per tick.
    pub hazard_max_speed: f32,
    /// Hazard circle diameter in world units.
    pub hazard_size: f32,
    /// Health assigned to newly spawned hazards.
    pub hazard_max_health: i32,
    /// Constant wander force applied to hazards each tick.
    pub wander_force: f32,
    /// Maximum wander heading perturbation in radians.
    pub wander_turn: f32,
    /// Shortest delay between wander heading shifts.
    pub wander_shift_min_ms: f64,
    /// Longest delay between wander heading shifts.
    pub wander_shift_max_ms: f64,
    /// Damage applied when a hazard contains an agent's center.
    pub contact_damage: i32,
    /// Per-attacker damage cooldown window in milliseconds.
    pub hit_cooldown_ms: f64,
    /// Duration of the hit flash armed by an accepted hit.
    pub hit_flash_ms: f64,
    /// Milliseconds between spawner activations; non-positive disables.
    pub spawn_interval_ms: f64,
    /// Horizontal offset past the view's right edge for spawned hazards.
    pub spawn_margin: f32,
    /// Hazards placed at world construction.
    pub initial_hazards: usize,
    /// Maximum retained tick summaries.
    pub history_capacity: usize,
    /// How frequently (in ticks) to flush tick summaries; 0 disables flushes.
    pub summary_interval: u32,
}

impl Default for BladeswarmConfig {
    fn default() -> Self {
        Self {
            world_width: 2_400.0,
            world_height: 1_350.0,
            view_width: 800.0,
            view_height: 450.0,
            tick_ms: 16.0,
            rng_seed: None,
            agent_max_speed: 6.0,
            agent_max_force: 0.25,
            agent_size: 16.0,
            separation_radius: 30.0,
            alignment_radius: 50.0,
            cohesion_radius: 50.0,
            steering: SteeringWeights::default(),
            spatial_index: SpatialIndexKind::default(),
            hazard_max_speed: 2.0,
            hazard_size: 40.0,
            hazard_max_health: 5,
            wander_force: 0.15,
            wander_turn: 1.0,
            wander_shift_min_ms: 1_000.0,
            wander_shift_max_ms: 3_000.0,
            contact_damage: 1,
            hit_cooldown_ms: 200.0,
            hit_flash_ms: 500.0,
            spawn_interval_ms: 4_000.0,
            spawn_margin: 80.0,
            initial_hazards: 3,
            history_capacity: 256,
            summary_interval: 0,
        }
    }
}

impl BladeswarmConfig {
    /// Validates the configuration before a world is built around it.
    fn validate(&self) -> Result<(), WorldError> {
        if !self.world_width.is_finite()
            || !self.world_height.is_finite()
            || self.world_width <= 0.0
            || self.world_height <= 0.0
        {
            return Err(WorldError::InvalidConfig(
                "world dimensions must be positive and finite",
            ));
        }
        if !self.view_width.is_finite()
            || !self.view_height.is_finite()
            || self.view_width <= 0.0
            || self.view_height <= 0.0
        {
            return Err(WorldError::InvalidConfig(
                "view dimensions must be positive and finite",
            ));
        }
        if !self.tick_ms.is_finite() || self.tick_ms <= 0.0 {
            return Err(WorldError::InvalidConfig("tick_ms must be positive"));
        }
        if !self.agent_max_speed.is_finite()
            || !self.agent_max_force.is_finite()
            || !self.agent_size.is_finite()
            || self.agent_max_speed <= 0.0
            || self.agent_max_force <= 0.0
            || self.agent_size <= 0.0
        {
            return Err(WorldError::InvalidConfig(
                "agent speed, force, and size must be positive and finite",
            ));
        }
        if !self.separation_radius.is_finite()
            || !self.alignment_radius.is_finite()
            || !self.cohesion_radius.is_finite()
            || self.separation_radius < 0.0
            || self.alignment_radius < 0.0
            || self.cohesion_radius < 0.0
        {
            return Err(WorldError::InvalidConfig(
                "steering radii must be non-negative and finite",
            ));
        }
        if !self.steering.separation.is_finite()
            || !self.steering.alignment.is_finite()
            || !self.steering.cohesion.is_finite()
            || !self.steering.seek.is_finite()
        {
            return Err(WorldError::InvalidConfig("steering weights must be finite"));
        }
        if !self.hazard_max_speed.is_finite()
            || !self.hazard_size.is_finite()
            || self.hazard_max_speed < 0.0
            || self.hazard_size <= 0.0
            || self.hazard_max_health <= 0
        {
            return Err(WorldError::InvalidConfig(
                "hazard speed must be finite and non-negative, size and health positive",
            ));
        }
        if !self.wander_force.is_finite()
            || !self.wander_turn.is_finite()
            || self.wander_turn < 0.0
            || self.wander_force < 0.0
            || !self.wander_shift_min_ms.is_finite()
            || !self.wander_shift_max_ms.is_finite()
            || self.wander_shift_min_ms < 0.0
            || self.wander_shift_max_ms < self.wander_shift_min_ms
        {
            return Err(WorldError::InvalidConfig(
                "wander parameters must be finite and non-negative with an ordered shift range",
            ));
        }
        if !self.hit_cooldown_ms.is_finite()
            || !self.hit_flash_ms.is_finite()
            || self.contact_damage <= 0
            || self.hit_cooldown_ms < 0.0
            || self.hit_flash_ms < 0.0
        {
            return Err(WorldError::InvalidConfig(
                "contact damage must be positive and hit windows finite and non-negative",
            ));
        }
        if !self.spawn_interval_ms.is_finite() {
            return Err(WorldError::InvalidConfig("spawn_interval_ms must be finite"));
        }
        if !self.spawn_margin.is_finite() || self.spawn_margin < 0.0 {
            return Err(WorldError::InvalidConfig(
                "spawn_margin must be non-negative and finite",
            ));
        }
        if self.history_capacity == 0 {
            return Err(WorldError::InvalidConfig(
                "history_capacity must be non-zero",
            ));
        }
        if let SpatialIndexKind::UniformGrid { cell_size } = self.spatial_index {
            if !cell_size.is_finite() || cell_size <= 0.0 {
                return Err(WorldError::InvalidConfig(
                    "grid cell_size must be positive and finite",
                ));
            }
        }
        Ok(())
    }

    /// Returns the configured RNG seed, generating one from entropy if absent.
    fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }

    /// Movement limits copied onto agents spawned from this configuration.
    #[must_use]
    pub fn agent_traits(&self) -> AgentTraits {
        AgentTraits {
            max_speed: self.agent_max_speed,
            max_force: self.agent_max_force,
            size: self.agent_size,
            separation_radius: self.separation_radius,
            alignment_radius: self.alignment_radius,
            cohesion_radius: self.cohesion_radius,
        }
    }

    fn wander_params(&self) -> WanderParams {
        WanderParams {
            force: self.wander_force,
            turn: self.wander_turn,
            shift_min_ms: self.wander_shift_min_ms,
            shift_max_ms: self.wander_shift_max_ms,
        }
    }

    fn world_bounds(&self) -> Vec2 {
        Vec2::new(self.world_width, self.world_height)
    }

    fn view_extent(&self) -> Vec2 {
        Vec2::new(self.view_width, self.view_height)
    }
}

/// Events emitted by a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickEvents {
    /// Tick the events belong to.
    pub tick: Tick,
    /// Hazards removed after dying this tick.
    pub hazards_slain: usize,
    /// Hazard created by the time-based spawner, if it fired.
    pub spawned: Option<HazardId>,
    /// Whether a summary was flushed to the observer this tick.
    pub summary_flushed: bool,
}

/// Aggregated statistics captured at summary flushes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickSummary {
    /// Tick the summary was captured on.
    pub tick: Tick,
    /// Live agents.
    pub agent_count: usize,
    /// Live hazards after cleanup and spawning.
    pub hazard_count: usize,
    /// Hazards slain this tick.
    pub hazards_slain: usize,
    /// Damage accepted by hazards this tick.
    pub damage_dealt: i32,
    /// Swarm center of mass; zero while the swarm is empty.
    pub swarm_center: Vec2,
}

/// Observer receiving flushed tick summaries.
pub trait SimObserver: Send {
    /// Called once per flushed summary.
    fn on_summary(&mut self, summary: &TickSummary);
}

/// Observer that drops every summary.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl SimObserver for NullObserver {
    fn on_summary(&mut self, _summary: &TickSummary) {}
}

/// Copy of one agent for renderers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    /// Stable handle.
    pub id: AgentId,
    /// Scalar fields at snapshot time.
    pub data: AgentData,
}

/// Copy of one hazard for renderers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HazardState {
    pub id: HazardId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub size: f32,
    pub health: i32,
    pub max_health: i32,
    pub alive: bool,
    pub hit_flash: bool,
}

/// Read-only copy of the world handed to renderers once per frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub tick: Tick,
    pub camera: Vec2,
    pub cursor_target: Vec2,
    pub agents: Vec<AgentState>,
    pub hazards: Vec<HazardState>,
    pub platforms: Vec<Platform>,
}

fn hazard_from_config(position: Vec2, config: &BladeswarmConfig) -> Hazard {
    Hazard::new(
        position,
        config.hazard_size,
        config.hazard_max_speed,
        config.hazard_max_health,
        config.hit_cooldown_ms,
        config.hit_flash_ms,
    )
}

/// Aggregate simulation state advanced one tick at a time.
pub struct World {
    config: BladeswarmConfig,
    tick: Tick,
    now_ms: f64,
    rng: SmallRng,
    swarm: Swarm,
    hazards: SlotMap<HazardId, Hazard>,
    platforms: Vec<Platform>,
    cursor_target: Vec2,
    camera: Vec2,
    last_spawn_ms: f64,
    observer: Box<dyn SimObserver>,
    history: VecDeque<TickSummary>,
    last_slain: usize,
    last_damage: i32,
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("config", &self.config)
            .field("tick", &self.tick)
            .field("now_ms", &self.now_ms)
            .field("agent_count", &self.swarm.len())
            .field("hazard_count", &self.hazards.len())
            .finish()
    }
}

impl World {
    /// Instantiate a new world using the supplied configuration.
    pub fn new(config: BladeswarmConfig) -> Result<Self, WorldError> {
        Self::with_observer(config, Box::new(NullObserver))
    }

    /// Instantiate a new world using the supplied configuration and observer.
    pub fn with_observer(
        config: BladeswarmConfig,
        observer: Box<dyn SimObserver>,
    ) -> Result<Self, WorldError> {
        config.validate()?;
        let mut rng = config.seeded_rng();
        let bounds = config.world_bounds();
        let mut hazards = SlotMap::with_key();
        for _ in 0..config.initial_hazards {
            let position = Vec2::new(
                rng.random_range(0.0..=bounds.x),
                rng.random_range(0.0..=bounds.y),
            );
            hazards.insert(hazard_from_config(position, &config));
        }
        let history_capacity = config.history_capacity;
        let swarm = Swarm::new(config.spatial_index);
        Ok(Self {
            tick: Tick::zero(),
            now_ms: 0.0,
            rng,
            swarm,
            hazards,
            platforms: Vec::new(),
            cursor_target: Vec2::new(bounds.x * 0.5, bounds.y * 0.5),
            camera: Vec2::ZERO,
            last_spawn_ms: 0.0,
            observer,
            history: VecDeque::with_capacity(history_capacity),
            last_slain: 0,
            last_damage: 0,
            config,
        })
    }

    fn stage_flocking(&mut self) {
        self.swarm.advance(self.cursor_target, &self.config.steering);
    }

    fn stage_platform_collisions(&mut self) {
        self.swarm.resolve_platform_collisions(&self.platforms);
    }

    fn stage_hazards(&mut self, now: f64) {
        let wander = self.config.wander_params();
        let bounds = self.config.world_bounds();
        for hazard in self.hazards.values_mut() {
            hazard.update(now, &mut self.rng, wander, bounds);
        }
    }

    fn stage_contact_damage(&mut self, now: f64) {
        let damage = self.config.contact_damage;
        let arena = self.swarm.arena();
        let positions = arena.columns().positions();
        let mut dealt = 0;
        for (idx, id) in arena.iter_handles().enumerate() {
            let point = positions[idx];
            for hazard in self.hazards.values_mut() {
                if hazard.contains_point(point) && hazard.take_damage(damage, id, now) {
                    dealt += damage;
                }
            }
        }
        self.last_damage += dealt;
    }

    fn stage_hazard_cleanup(&mut self) {
        let before = self.hazards.len();
        self.hazards.retain(|_, hazard| hazard.is_alive());
        self.last_slain += before - self.hazards.len();
    }

    fn stage_spawner(&mut self, now: f64) -> Option<HazardId> {
        let interval = self.config.spawn_interval_ms;
        if interval <= 0.0 || now - self.last_spawn_ms < interval {
            return None;
        }
        let bounds = self.config.world_bounds();
        let x = (self.camera.x + self.config.view_width + self.config.spawn_margin).min(bounds.x);
        let y = self.rng.random_range(0.0..=bounds.y);
        let id = self.spawn_hazard(Vec2::new(x, y));
        self.last_spawn_ms = now;
        Some(id)
    }

    fn stage_camera(&mut self) {
        if let Some(centroid) = self.swarm.center_of_mass() {
            self.camera = camera_origin(
                centroid,
                self.config.view_extent(),
                self.config.world_bounds(),
            );
        }
    }

    fn stage_summary(&mut self, next_tick: Tick) -> bool {
        if self.config.summary_interval == 0
            || !next_tick
                .0
                .is_multiple_of(self.config.summary_interval as u64)
        {
            return false;
        }
        let summary = TickSummary {
            tick: next_tick,
            agent_count: self.swarm.len(),
            hazard_count: self.hazards.len(),
            hazards_slain: self.last_slain,
            damage_dealt: self.last_damage,
            swarm_center: self.swarm.center_of_mass().unwrap_or(Vec2::ZERO),
        };
        self.observer.on_summary(&summary);
        if self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(summary);
        true
    }

    fn stage_reset_counters(&mut self) {
        self.last_slain = 0;
        self.last_damage = 0;
    }

    /// Execute one simulation tick pipeline, returning emitted events.
    ///
    /// Stage order is fixed: flocking, platform collisions, hazard wander,
    /// contact damage, dead-hazard cleanup, time-based spawning, camera
    /// tracking, then the summary flush. The world clock advances by
    /// `tick_ms` and every stage observes the same `now` value.
    pub fn update(&mut self) -> TickEvents {
        let next_tick = self.tick.next();
        let now = self.now_ms + self.config.tick_ms;

        self.stage_flocking();
        self.stage_platform_collisions();
        self.stage_hazards(now);
        self.stage_contact_damage(now);
        self.stage_hazard_cleanup();
        let spawned = self.stage_spawner(now);
        self.stage_camera();
        let summary_flushed = self.stage_summary(next_tick);

        let events = TickEvents {
            tick: next_tick,
            hazards_slain: self.last_slain,
            spawned,
            summary_flushed,
        };
        self.stage_reset_counters();
        self.tick = next_tick;
        self.now_ms = now;
        events
    }

    /// Returns an immutable reference to configuration.
    #[must_use]
    pub fn config(&self) -> &BladeswarmConfig {
        &self.config
    }

    /// Mutable access to the configuration (for hot edits).
    #[must_use]
    pub fn config_mut(&mut self) -> &mut BladeswarmConfig {
        &mut self.config
    }

    /// Replace the observer sink.
    pub fn set_observer(&mut self, observer: Box<dyn SimObserver>) {
        self.observer = observer;
    }

    /// Current simulation tick.
    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    /// Simulated milliseconds elapsed since construction.
    #[must_use]
    pub const fn now_ms(&self) -> f64 {
        self.now_ms
    }

    /// View top-left corner tracking the swarm.
    #[must_use]
    pub const fn camera(&self) -> Vec2 {
        self.camera
    }

    /// Pointer target the swarm seeks.
    #[must_use]
    pub const fn cursor_target(&self) -> Vec2 {
        self.cursor_target
    }

    /// Store the pointer position in world coordinates (camera-adjusted by
    /// the caller).
    pub fn update_cursor_target(&mut self, x: f32, y: f32) {
        self.cursor_target = Vec2::new(x, y);
    }

    /// Borrow the swarm controller.
    #[must_use]
    pub fn swarm(&self) -> &Swarm {
        &self.swarm
    }

    /// Borrow the live hazards.
    #[must_use]
    pub fn hazards(&self) -> &SlotMap<HazardId, Hazard> {
        &self.hazards
    }

    /// Borrow the static platforms.
    #[must_use]
    pub fn platforms(&self) -> &[Platform] {
        &self.platforms
    }

    /// Install a static platform.
    pub fn add_platform(&mut self, platform: Platform) {
        self.platforms.push(platform);
    }

    /// Iterate over retained summaries, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &TickSummary> {
        self.history.iter()
    }

    /// Number of live agents.
    #[must_use]
    pub fn agent_count(&self) -> usize {
        self.swarm.len()
    }

    /// Spawn an agent at `position` with traits taken from configuration.
    pub fn spawn_agent(&mut self, position: Vec2) -> AgentId {
        self.swarm
            .insert(AgentData::new(position, self.config.agent_traits()))
    }

    /// Spawn an agent from explicit scalar state.
    pub fn spawn_agent_with(&mut self, agent: AgentData) -> AgentId {
        self.swarm.insert(agent)
    }

    /// Remove an agent, returning its scalar state if it was present.
    pub fn remove_agent(&mut self, id: AgentId) -> Option<AgentData> {
        self.swarm.remove(id)
    }

    /// Spawn a hazard at `position` with stats taken from configuration.
    pub fn spawn_hazard(&mut self, position: Vec2) -> HazardId {
        self.hazards
            .insert(hazard_from_config(position, &self.config))
    }

    /// Capture a read-only copy of the world for renderers.
    #[must_use]
    pub fn snapshot(&self) -> WorldSnapshot {
        let arena = self.swarm.arena();
        let mut agents = Vec::with_capacity(arena.len());
        for id in arena.iter_handles() {
            if let Some(data) = arena.snapshot(id) {
                agents.push(AgentState { id, data });
            }
        }
        let mut hazards = Vec::with_capacity(self.hazards.len());
        for (id, hazard) in &self.hazards {
            hazards.push(HazardState {
                id,
                position: hazard.position,
                velocity: hazard.velocity,
                size: hazard.size,
                health: hazard.health(),
                max_health: hazard.max_health(),
                alive: hazard.is_alive(),
                hit_flash: hazard.hit_flash(self.now_ms),
            });
        }
        WorldSnapshot {
            tick: self.tick,
            camera: self.camera,
            cursor_target: self.cursor_target,
            agents,
            hazards,
            platforms: self.platforms.clone(),
        }
    }
}
