//! Headless demo: fills a block with particles, drops it onto a floor next to
//! an animated paddle, and steps object updates and collision resolution.
//!
//! The integration step here is a plain gravity kick and drift, only there to
//! give the collision pass something to do.

use std::path::Path;
use std::sync::Arc;

use glam::Vec3;
use psim_core::{BoundaryCondition, GlobalParameters, PARTICLE_DATA, POSITION, Result, VELOCITY};
use psim_geometry::{GeometryObject, Shape};
use psim_objects::{RigidBody, SimulationObject};
use psim_sim::SimulationContext;
use rayon::prelude::*;
use serde_json::{Value, json};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() {
    let scene = scene();
    let console = GlobalParameters::from_json(&scene)
        .map(|global| global.console_filter())
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(console)))
        .init();

    if let Err(e) = run(&scene) {
        error!(error = %e, "simulation aborted");
        std::process::exit(1);
    }
}

fn scene() -> Value {
    json!({
        "GlobalParameters": {
            "FrameDuration": 0.02,
            "StartFrame": 1,
            "FinalFrame": 60,
            "NThreads": 4,
            "Seed": 2024,
            "DataPath": "./Output/demo",
            "OutputFormat": "OBJ",
            "SaveFrameData": false,
            "ConsoleLogLevel": "info"
        },
        "SimulationParameters": {
            "ParticleRadius": 0.03125,
            "Gravity": [0.0, -9.81, 0.0],
            "BoxMin": [-1.0, 0.0, -1.0],
            "BoxMax": [1.0, 2.0, 1.0]
        },
        "ParticleGenerators": [{
            "Name": "Block",
            "GeometryType": "Box",
            "BoxMin": [-0.5, 0.5, -0.25],
            "BoxMax": [0.0, 1.0, 0.25],
            "MaterialDensity": 1000.0,
            "ParticleGeneration": { "Enable": true, "JitterRatio": 0.1 }
        }],
        "RigidBodies": [{
            "Name": "Paddle",
            "GeometryType": "Sphere",
            "Center": [0.5, 0.3, 0.0],
            "Radius": 0.2,
            "BCType": "Separate",
            "BoundaryFriction": 0.2,
            "ParticleGeneration": { "Enable": true, "ThicknessRatio": 2.0 },
            "Animation": {
                "KeyFrames": [
                    { "Frame": 0 },
                    { "Frame": 60, "Translation": [-0.6, 0.0, 0.0], "RotationAngle": 3.14159, "RotationAxis": [0, 0, 1] }
                ]
            }
        }]
    })
}

fn run(scene: &Value) -> Result<()> {
    let mut context = SimulationContext::<Vec3>::from_json(scene)?;
    let global = context.global().clone();
    global.log_parameters();

    // the floor is built in code rather than from the scene
    let radius = context.particle_radius()?;
    let (domain_min, domain_max) = context.domain()?;
    let floor_shape = Shape::Box {
        min: Vec3::new(domain_min.x - 1.0, domain_min.y - 1.0, domain_min.z - 1.0),
        max: Vec3::new(domain_max.x + 1.0, domain_min.y, domain_max.z + 1.0),
    };
    let floor = SimulationObject::new(
        "Floor",
        Arc::new(GeometryObject::new(floor_shape)),
        radius,
        context.ids_mut(),
    );
    context.add_rigid_body(
        RigidBody::new(floor)
            .with_boundary_condition(BoundaryCondition::Slip)
            .with_friction(0.1),
    );

    let pool = match global.thread_count() {
        Some(n) => Some(
            rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| psim_core::Error::InvalidConfigValue {
                    field: "NThreads".into(),
                    reason: e.to_string(),
                })?,
        ),
        None => None,
    };
    match &pool {
        Some(pool) => pool.install(|| simulate(&mut context)),
        None => simulate(&mut context),
    }
}

fn simulate(context: &mut SimulationContext<Vec3>) -> Result<()> {
    let count = context.generate_particles()?;
    let global = context.global().clone();
    let dt = global.frame_duration;
    let gravity = context.gravity()?;
    let radius = context.particle_radius()?;
    info!(particles = count, threads = rayon::current_num_threads(), "starting");

    for frame in global.start_frame..=global.final_frame {
        let particles = context.properties_mut().group_mut(PARTICLE_DATA)?;
        let (positions, velocities) = particles.property_pair_mut::<Vec3, Vec3>(POSITION, VELOCITY)?;
        positions
            .data_mut()
            .par_iter_mut()
            .zip(velocities.data_mut().par_iter_mut())
            .for_each(|(p, v)| {
                *v += gravity * dt;
                *p += *v * dt;
            });

        let stats = context.advance_frame(frame)?;
        if global.save_frame_data {
            let path = Path::new(&global.data_path)
                .join(format!("frame.{frame:04}.{}", global.output_format.extension()));
            let positions = context.properties().property::<Vec3>(PARTICLE_DATA, POSITION)?;
            psim_storage::save_particles(&path, global.output_format, positions.data(), radius)?;
        }
        if frame % 10 == 0 {
            let lowest = context
                .properties()
                .property::<Vec3>(PARTICLE_DATA, POSITION)?
                .iter()
                .map(|p| p.y)
                .fold(f32::MAX, f32::min);
            info!(
                frame,
                collisions = stats.collisions,
                paddle_moved = stats.objects_moved,
                lowest,
                time = context.global().system_time(),
                "frame done"
            );
        }
    }
    Ok(())
}
