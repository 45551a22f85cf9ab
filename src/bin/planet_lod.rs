//! Planet LOD driver: builds an icosphere planet and flies a viewer around it.
//!
//! Usage: cargo run --release --bin planet_lod -- [OPTIONS]
//!
//! Options:
//!   --config <PATH>       Load a PlanetConfig JSON file (flags below override it)
//!   --radius <R>          Planet radius (default: 1000)
//!   --chunk-div <N>       Subdivisions inside a chunk, 1..=8 (default: 4)
//!   --max-chunks <N>      Chunk slots (default: 2000)
//!   --max-shared <N>      Shared border vertex slots (default: 120000)
//!   --max-depth <N>       Deepest hierarchy level (default: 10)
//!   --altitude <H>        Viewer height above the surface (default: radius / 20)
//!   --detail <F>          Subdivide while distance < size * F (default: 2.5)
//!   --passes <N>          LOD passes along the orbit (default: 8)

use std::path::PathBuf;
use std::time::Instant;

use glam::{Quat, Vec3};

use planeta::icosphere::tree::DEFAULT_MAX_TRIANGLES;
use planeta::planet::{ChunkUpdateAction, PassSummary, PlanetConfig, PlanetGeometry, VERTEX_STRIDE};
use planeta::{IcoSphereTree, Result};

/// Angle subtended by a root face edge of the icosahedron
const ROOT_EDGE_ANGLE: f32 = 1.107_149;

fn main() {
    planeta::core::logging::init();

    if let Err(e) = run() {
        log::error!("planet_lod failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    let mut config = match parse_str_arg(&args, "--config") {
        Some(path) => PlanetConfig::load(&PathBuf::from(path))?,
        None => PlanetConfig::default(),
    };
    if let Some(radius) = parse_f32_arg(&args, "--radius") {
        config.radius = radius;
    }
    if let Some(div) = parse_u32_arg(&args, "--chunk-div") {
        config.chunk_subdivisions = div;
    }
    if let Some(n) = parse_u32_arg(&args, "--max-chunks") {
        config.max_chunks = n;
    }
    if let Some(n) = parse_u32_arg(&args, "--max-shared") {
        config.max_shared_vertices = n;
    }
    config.validate()?;

    let max_depth = parse_u32_arg(&args, "--max-depth").unwrap_or(10).min(u8::MAX as u32) as u8;
    let altitude = parse_f32_arg(&args, "--altitude").unwrap_or(config.radius / 20.0);
    let detail = parse_f32_arg(&args, "--detail").unwrap_or(2.5);
    let passes = parse_u32_arg(&args, "--passes").unwrap_or(8);

    println!("=== Planeta LOD Driver ===");
    println!("Radius:   {}", config.radius);
    println!("Chunks:   {} slots, {} subdivisions each", config.max_chunks, config.chunk_subdivisions);
    println!("Shared:   {} slots", config.max_shared_vertices);
    println!("Viewer:   {} above surface, detail {}", altitude, detail);
    println!();

    let radius = config.radius;
    let tree = IcoSphereTree::new(max_depth, DEFAULT_MAX_TRIANGLES);
    let mut planet = PlanetGeometry::new(tree, config)?;

    let start = Instant::now();
    for pass in 0..passes {
        // Orbit once around a tilted axis over all passes
        let angle = std::f32::consts::TAU * pass as f32 / passes.max(1) as f32;
        let axis = Vec3::new(0.3, 1.0, 0.1).normalize();
        let viewer = Quat::from_axis_angle(axis, angle) * Vec3::X * (radius + altitude);

        let pass_start = Instant::now();
        let result = planet.chunk_geometry_update(|tri, _, _| {
            let size = radius * ROOT_EDGE_ANGLE / (1u32 << tri.depth) as f32;
            let distance = viewer.distance(tri.center * radius);
            if tri.depth < max_depth && distance < size * detail {
                ChunkUpdateAction::Subdivide
            } else {
                ChunkUpdateAction::Chunk
            }
        });
        let summary = match result {
            Ok(summary) => summary,
            Err(e) if e.is_capacity() => {
                log::warn!("Pass {} incomplete, lower --detail or raise capacity: {}", pass, e);
                PassSummary::default()
            }
            Err(e) => return Err(e),
        };

        let vertex_ranges = planet.updates_vertex_changes().len();
        let index_ranges = planet.updates_index_changes().len();
        let dirty_bytes = planet
            .updates_vertex_changes()
            .iter()
            .map(|r| r.len() as usize * VERTEX_STRIDE)
            .sum::<usize>()
            + planet
                .updates_index_changes()
                .iter()
                .map(|r| r.len() as usize * std::mem::size_of::<u32>())
                .sum::<usize>();
        planet.updates_clear();

        println!(
            "Pass {:>3}: +{} -{} chunks, {} split, {} merged, {} packed | {} live | {} + {} dirty ranges ({:.1} KB) in {:.2?}",
            pass,
            summary.chunks_added,
            summary.chunks_removed,
            summary.subdivided,
            summary.unsubdivided,
            summary.relocated,
            planet.chunk_count(),
            vertex_ranges,
            index_ranges,
            dirty_bytes as f64 / 1024.0,
            pass_start.elapsed()
        );
    }
    println!();
    println!("Total: {:.2?}", start.elapsed());

    planet.debug_verify_state()?;
    planet.log_stats();
    Ok(())
}

fn parse_f32_arg(args: &[String], flag: &str) -> Option<f32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_u32_arg(args: &[String], flag: &str) -> Option<u32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
