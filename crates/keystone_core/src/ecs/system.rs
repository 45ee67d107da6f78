//! # Systems
//!
//! Systems hold the behavior: each frame they query the [`Coordinator`] for
//! the entities they care about and update their components. The
//! [`SystemManager`] runs them serially in registration order and records
//! how long each one took.

use std::time::{Duration, Instant};

use super::coordinator::Coordinator;

/// Per-frame logic operating on entities with specific component sets.
pub trait System: Send {
    /// Name used in logs and profiler events.
    fn name(&self) -> &'static str;

    /// Called once before the first update. Returning `false` disables the
    /// system for the rest of the manager's lifetime.
    fn initialize(&mut self, _coordinator: &Coordinator) -> bool {
        true
    }

    /// Advances the system by `dt` seconds.
    fn update(&mut self, coordinator: &Coordinator, dt: f32);

    /// Called once on teardown, in reverse registration order.
    fn shutdown(&mut self, _coordinator: &Coordinator) {}
}

/// Wall-clock cost of one system update.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileEvent {
    /// System name.
    pub name: &'static str,
    /// Elapsed time.
    pub elapsed: Duration,
}

impl ProfileEvent {
    /// Elapsed time in milliseconds.
    #[must_use]
    pub fn millis(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

/// Collects per-system timings for the most recent frame.
#[derive(Debug, Default)]
pub struct Profiler {
    last_frame: Vec<ProfileEvent>,
}

impl Profiler {
    /// Creates an empty profiler.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_frame: Vec::new(),
        }
    }

    /// Discards the previous frame's events.
    pub fn new_frame(&mut self) {
        self.last_frame.clear();
    }

    /// Records one event for the current frame.
    pub fn record(&mut self, name: &'static str, elapsed: Duration) {
        self.last_frame.push(ProfileEvent { name, elapsed });
    }

    /// Events of the current frame, in recording order.
    #[must_use]
    pub fn last_frame(&self) -> &[ProfileEvent] {
        &self.last_frame
    }

    /// Sum of all recorded times this frame.
    #[must_use]
    pub fn frame_total(&self) -> Duration {
        self.last_frame.iter().map(|event| event.elapsed).sum()
    }
}

struct Slot {
    system: Box<dyn System>,
    enabled: bool,
}

/// Owns the registered systems and drives them each frame.
#[derive(Default)]
pub struct SystemManager {
    slots: Vec<Slot>,
    profiler: Profiler,
}

impl SystemManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a system. Systems run in the order they are added.
    pub fn add<S: System + 'static>(&mut self, system: S) {
        tracing::debug!(system = system.name(), "system added");
        self.slots.push(Slot {
            system: Box::new(system),
            enabled: true,
        });
    }

    /// Number of registered systems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if no system is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Initializes every system. Returns how many succeeded.
    ///
    /// A system whose `initialize` returns `false` is skipped by later
    /// updates and shutdowns.
    pub fn initialize_all(&mut self, coordinator: &Coordinator) -> usize {
        let mut ready = 0;
        for slot in &mut self.slots {
            slot.enabled = slot.system.initialize(coordinator);
            if slot.enabled {
                ready += 1;
            } else {
                tracing::warn!(system = slot.system.name(), "system failed to initialize");
            }
        }
        ready
    }

    /// Runs one frame: every enabled system, serially, each timed.
    pub fn update(&mut self, coordinator: &Coordinator, dt: f32) {
        self.profiler.new_frame();
        for slot in self.slots.iter_mut().filter(|slot| slot.enabled) {
            let name = slot.system.name();
            let _span = tracing::trace_span!("system_update", system = name).entered();

            let start = Instant::now();
            slot.system.update(coordinator, dt);
            self.profiler.record(name, start.elapsed());
        }
    }

    /// Shuts down enabled systems in reverse order and disables them.
    pub fn shutdown_all(&mut self, coordinator: &Coordinator) {
        for slot in self.slots.iter_mut().rev().filter(|slot| slot.enabled) {
            slot.system.shutdown(coordinator);
            slot.enabled = false;
        }
    }

    /// Timings of the most recent frame.
    #[must_use]
    pub const fn profiler(&self) -> &Profiler {
        &self.profiler
    }
}

impl std::fmt::Debug for SystemManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemManager")
            .field(
                "systems",
                &self.slots.iter().map(|s| s.system.name()).collect::<Vec<_>>(),
            )
            .field("profiler", &self.profiler)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::config::EngineConfig;

    #[derive(Clone, Copy, Debug, Default)]
    struct Position {
        x: f32,
    }

    #[derive(Clone, Copy, Debug)]
    struct Velocity {
        dx: f32,
    }

    struct Movement;

    impl System for Movement {
        fn name(&self) -> &'static str {
            "Movement"
        }

        fn update(&mut self, coordinator: &Coordinator, dt: f32) {
            for entity in coordinator.entities_with::<(Position, Velocity)>().unwrap() {
                let velocity = coordinator.get_component::<Velocity>(entity).unwrap();
                coordinator
                    .with_component::<Position, _>(entity, |p| p.x += velocity.dx * dt)
                    .unwrap();
            }
        }
    }

    struct Recorder {
        name: &'static str,
        init_ok: bool,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl System for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn initialize(&mut self, _: &Coordinator) -> bool {
            self.log.lock().unwrap().push(format!("init {}", self.name));
            self.init_ok
        }

        fn update(&mut self, _: &Coordinator, _: f32) {
            self.log.lock().unwrap().push(format!("update {}", self.name));
        }

        fn shutdown(&mut self, _: &Coordinator) {
            self.log.lock().unwrap().push(format!("shutdown {}", self.name));
        }
    }

    fn coordinator() -> Coordinator {
        Coordinator::new(&EngineConfig {
            arena_bytes: 64 * 1024,
            max_entities: 16,
            ..EngineConfig::default()
        })
    }

    #[test]
    fn test_movement_system() {
        let coordinator = coordinator();
        coordinator.register_component::<Position>().unwrap();
        coordinator.register_component::<Velocity>().unwrap();

        let mover = coordinator.create_entity().unwrap();
        coordinator.add_component(mover, Position::default()).unwrap();
        coordinator.add_component(mover, Velocity { dx: 2.0 }).unwrap();
        let idle = coordinator.create_entity().unwrap();
        coordinator.add_component(idle, Position::default()).unwrap();

        let mut manager = SystemManager::new();
        manager.add(Movement);
        assert_eq!(manager.initialize_all(&coordinator), 1);

        manager.update(&coordinator, 0.5);
        manager.update(&coordinator, 0.5);

        assert!((coordinator.get_component::<Position>(mover).unwrap().x - 2.0).abs() < 1e-6);
        assert!(coordinator.get_component::<Position>(idle).unwrap().x.abs() < f32::EPSILON);

        let frame = manager.profiler().last_frame();
        assert_eq!(frame.len(), 1);
        assert_eq!(frame[0].name, "Movement");
    }

    #[test]
    fn test_lifecycle_order_and_failed_init() {
        let coordinator = coordinator();
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut manager = SystemManager::new();
        for (name, init_ok) in [("a", true), ("b", false), ("c", true)] {
            manager.add(Recorder {
                name,
                init_ok,
                log: Arc::clone(&log),
            });
        }

        assert_eq!(manager.initialize_all(&coordinator), 2);
        manager.update(&coordinator, 0.016);
        manager.shutdown_all(&coordinator);

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "init a", "init b", "init c", "update a", "update c", "shutdown c",
                "shutdown a",
            ]
        );
        assert_eq!(manager.profiler().last_frame().len(), 2);
    }

    #[test]
    fn test_profiler_new_frame() {
        let mut profiler = Profiler::new();
        profiler.record("x", Duration::from_millis(2));
        profiler.record("y", Duration::from_millis(3));
        assert_eq!(profiler.frame_total(), Duration::from_millis(5));
        assert!((profiler.last_frame()[0].millis() - 2.0).abs() < 1e-9);

        profiler.new_frame();
        assert!(profiler.last_frame().is_empty());
    }
}
