use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use anyhow::Result;
use glam::{Quat, Vec3};
use tether::{
    LocalRole, PhysicalBody, PhysicsWorld, RapierBody, SyncEvent, TickSource, TransformBody,
    TransformSync,
};

use crate::config::DemoConfig;
use crate::link::{LinkAt, LinkStats, LossyLink};

const SERVER: u32 = 0;
const CLIENT: u32 = 1;
/// Authority samples kept for measuring observer error.
const TRAIL_SECONDS: f32 = 2.0;

#[derive(Debug, Default)]
pub struct Report {
    pub ticks: u32,
    pub mean_error: f32,
    pub max_error: f32,
    pub extrapolation_failures: u32,
    pub discarded: u64,
    pub link: LinkStats,
    pub records_accepted: u64,
    pub records_dropped: u64,
}

/// Positions of the authority over time, for looking up where it was when the
/// observer's render time was current.
struct Trail {
    samples: VecDeque<(f32, Vec3)>,
}

impl Trail {
    fn new() -> Self {
        Self {
            samples: VecDeque::new(),
        }
    }

    fn push(&mut self, time: f32, position: Vec3) {
        self.samples.push_back((time, position));
        while self
            .samples
            .front()
            .is_some_and(|(t, _)| time - t > TRAIL_SECONDS)
        {
            self.samples.pop_front();
        }
    }

    fn at(&self, time: f32) -> Option<Vec3> {
        let after = self.samples.iter().position(|(t, _)| *t >= time)?;
        let (t1, p1) = self.samples[after];
        if after == 0 {
            return Some(p1);
        }
        let (t0, p0) = self.samples[after - 1];
        let span = t1 - t0;
        let s = if span > 0.0 { (time - t0) / span } else { 1.0 };
        Some(p0.lerp(p1, s))
    }
}

/// Throws a rapier ball on the server and shows it on a client over the
/// simulated link.
pub fn run(config: &DemoConfig, seed: u64) -> Result<Report> {
    let scenario = &config.scenario;
    let dt = 1.0 / scenario.tick_rate.max(1) as f32;

    let physics = Rc::new(RefCell::new(PhysicsWorld::new(config.sync.gravity, dt)));
    let handle = {
        let mut world = physics.borrow_mut();
        world.add_ground(0.0, 50.0);
        world.add_dynamic_sphere(
            Vec3::new(0.0, scenario.launch_height, 0.0),
            0.25,
            1.0,
            scenario.ball_damping,
        )
    };
    let start = Vec3::new(0.0, scenario.launch_height, 0.0);

    let mut ball = RapierBody::new(Rc::clone(&physics), handle);
    ball.set_velocity(Vec3::from_array(scenario.launch_velocity));

    let mut server = TransformSync::new(
        config.sync.clone(),
        ball,
        LocalRole::server(SERVER),
        None,
    )?;
    let shadow = TransformBody {
        drag: scenario.ball_damping,
        gravity_scale: 1.0,
        ..TransformBody::at(start)
    };
    let mut client = TransformSync::new(
        config.sync.clone(),
        shadow,
        LocalRole::client(CLIENT),
        None,
    )?;

    let mut link = LossyLink::new(config.link, seed);
    let mut trail = Trail::new();
    let mut report = Report::default();
    let mut error_sum = 0.0f64;
    let mut measured = 0u32;
    let mut teleported = false;

    let ticks = (scenario.duration / dt).ceil() as u32;
    for tick in 1..=ticks {
        let now = f64::from(tick) * f64::from(dt);

        physics.borrow_mut().step();
        if !teleported && scenario.teleport_at.is_some_and(|at| now as f32 >= at) {
            teleported = true;
            server.teleport(start, Quat::IDENTITY, Vec3::ONE)?;
            server
                .body_mut()
                .set_velocity(Vec3::from_array(scenario.launch_velocity));
        }

        server.tick(dt, TickSource::Render);
        server.flush(&mut LinkAt {
            link: &mut link,
            now,
        });
        trail.push(server.local_time(), server.body().position());

        for message in link.take(now) {
            // Bad payloads are already counted and logged by the receiver.
            let _ = client.receive(message.channel, &message.payload);
        }
        client.tick(dt, TickSource::Render);

        for event in client.drain_events() {
            match event {
                SyncEvent::ExtrapolationFailed => report.extrapolation_failures += 1,
                SyncEvent::Teleported { pose } => {
                    log::info!("client saw teleport to {}", pose.position)
                }
                _ => {}
            }
        }

        // Once the first interpolation delay has passed, the client should
        // show what the server had one delay ago.
        let render_time = client.stats().authority_time - config.sync.interpolation_delay;
        if client.stats().records_accepted > 0 && render_time > 0.0 {
            if let Some(expected) = trail.at(render_time) {
                let error = client.body().position.distance(expected);
                error_sum += f64::from(error);
                measured += 1;
                report.max_error = report.max_error.max(error);
            }
        }

        if tick % scenario.tick_rate.max(1) == 0 {
            let stats = client.stats();
            log::debug!(
                "t={now:.1}s history={} accepted={} outcome={:?}",
                stats.history_len,
                stats.records_accepted,
                stats.last_outcome
            );
        }
    }

    let stats = client.stats();
    report.ticks = ticks;
    report.mean_error = if measured > 0 {
        (error_sum / f64::from(measured)) as f32
    } else {
        0.0
    };
    report.discarded = stats.messages_discarded;
    report.records_accepted = stats.records_accepted;
    report.records_dropped = stats.records_dropped;
    report.link = link.stats();
    Ok(report)
}
