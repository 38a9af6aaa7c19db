//! Side-by-side sessions built from config, driven directly and through the player.

use epidemic_common::{RunConfig, SeriesMask};
use epidemic_engine::{Player, Progress, Session};
use std::time::Duration;

const TWO_CITIES: &str = r#"
[simulation]
capacity = 20000
start_infected = 10
seed = 99
total_steps = 20

[[lanes]]
name = "Dense"
[lanes.location]
name = "Dense City"
population = 200000
area = 50.0
[lanes.disease]
name = "Flu"
r0 = 1.8
mortality_rate = 0.001
incubation_period = 2
infectious_period = 5

[[lanes]]
name = "Sparse"
[lanes.location]
name = "Sparse Town"
population = 8000
area = 400.0
[lanes.disease]
name = "Measles"
r0 = 15.0
mortality_rate = 0.002
incubation_period = 10
infectious_period = 8
[lanes.measures]
vaccinated_fraction = 0.9
lockdown_enabled = true

[output]
base_filename = "two_cities"
save_stats = false
"#;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn two_cities() -> Session {
    let config = RunConfig::from_toml_str(TWO_CITIES).unwrap();
    Session::from_config(&config).unwrap()
}

#[test]
fn lanes_follow_their_configuration() {
    init_logging();
    let session = two_cities();
    assert!(session.is_runnable());
    assert_eq!(session.lanes().len(), 2);

    let dense = session.lane(0).unwrap();
    assert_eq!(dense.name(), "Dense");
    // 200000 people over 50 km^2, capped at 20000: width floor(sqrt(5)) = 2.
    assert_eq!(dense.engine().grid_width(), 2);
    assert_eq!(dense.engine().total_individuals(), 20_000);

    let sparse = session.lane(1).unwrap();
    assert_eq!(sparse.engine().grid_width(), 20);
    assert_eq!(sparse.engine().total_individuals(), 8_000);
    assert_eq!(sparse.engine().measures().vaccinated_fraction, 0.9);
    assert!(sparse.engine().measures().lockdown_enabled);
}

#[test]
fn seeded_sessions_replay_identically() {
    init_logging();
    let mut a = two_cities();
    let mut b = two_cities();
    for _ in 0..15 {
        a.step_forward();
        b.step_forward();
    }
    assert_eq!(a.read_series(), b.read_series());
    // Lanes get distinct streams.
    assert_ne!(a.lanes()[0].engine().series(), a.lanes()[1].engine().series());
}

#[test]
fn every_lane_conserves_individuals() {
    init_logging();
    let mut session = two_cities();
    for _ in 0..20 {
        session.step_forward();
    }
    for lane in session.lanes() {
        let total = lane.engine().total_individuals();
        assert!(lane.engine().series().iter().all(|counts| counts.population() == total));
        assert_eq!(lane.loaded_timesteps(), 21);
    }
}

#[test]
fn axis_limits_cover_visible_series() {
    init_logging();
    let mut session = two_cities();
    for _ in 0..10 {
        session.step_forward();
    }
    let mask = SeriesMask::default();
    let limits = session.axis_limits(mask, false);
    for (lane, limit) in session.lanes().iter().zip(&limits) {
        let max = lane.max_visible_value(mask, session.viewed());
        assert!(*limit >= 50);
        assert!(*limit >= max);
    }
    let shared = session.axis_limits(mask, true);
    assert!(shared.iter().all(|&limit| limit == *limits.iter().max().unwrap()));
}

#[test]
fn player_preserves_history_across_pause_and_resume() {
    init_logging();
    let mut player = Player::new(two_cities());

    assert!(player.play(Duration::from_millis(2)).unwrap());
    player.progress().recv_timeout(Duration::from_secs(10)).unwrap();
    player.pause().unwrap();
    let paused = player.snapshot().unwrap();
    assert_eq!(paused.loaded, paused.viewed + 1);

    // Scrub back; loaded history stays put.
    player.step_back().unwrap();
    player.first().unwrap();
    assert_eq!(
        player.snapshot().unwrap(),
        Progress { viewed: 0, loaded: paused.loaded }
    );

    // Resume from the start: replays buffered steps before computing new ones.
    assert!(player.play(Duration::from_millis(2)).unwrap());
    let mut latest = player.progress().recv_timeout(Duration::from_secs(10)).unwrap();
    while latest.viewed < paused.loaded + 2 {
        latest = player.progress().recv_timeout(Duration::from_secs(10)).unwrap();
    }
    player.pause().unwrap();

    let session = player.into_session().unwrap();
    let progress = session.progress();
    assert_eq!(progress.loaded, progress.viewed + 1);
    for lane in session.lanes() {
        assert_eq!(lane.engine().series().len(), lane.loaded_timesteps());
    }
}

#[test]
fn idle_lane_keeps_the_player_stopped() {
    init_logging();
    let config = RunConfig::from_toml_str(
        r#"
[simulation]
total_steps = 5

[[lanes]]
name = "Unconfigured"

[output]
base_filename = "idle"
save_stats = false
"#,
    )
    .unwrap();
    let mut player = Player::new(Session::from_config(&config).unwrap());
    assert!(!player.play(Duration::from_millis(1)).unwrap());
    assert!(!player.step().unwrap());
    assert_eq!(player.snapshot().unwrap(), Progress { viewed: 0, loaded: 1 });
}
