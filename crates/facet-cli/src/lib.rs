//! # Facet CLI
//!
//! Command-line interface for the Facet toolkit.
//!
//! ## Commands
//! - `octasphere` - Generate a sphere, capsule or rounded box
//! - `orient` - Compute tangent frames for raw position/index buffers
//! - `table` - Print tessellation counts per subdivision level
//! - `bindings` - Validate and load a resource binding manifest

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use facet_assets::{BufferBinding, FileBlobSource, RecordingUploader, ResourceLoader, TextureBinding};
use facet_core::Aabb;
use facet_core::math::Vec3;
use facet_geometry::octasphere::{triangles_per_patch, vertices_per_patch, PATCH_COUNT};
use facet_geometry::{MAX_SUBDIVISIONS, MeshBuffers, Octasphere, OctasphereConfig, SurfaceOrientation};

/// Facet geometry toolkit CLI
#[derive(Parser)]
#[command(name = "facet")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Generate an octasphere mesh
    Octasphere {
        /// Extent along X
        #[arg(long)]
        width: Option<f32>,

        /// Extent along Y
        #[arg(long)]
        height: Option<f32>,

        /// Extent along Z
        #[arg(long)]
        depth: Option<f32>,

        /// Corner radius
        #[arg(short, long)]
        radius: Option<f32>,

        /// Subdivision level
        #[arg(short, long)]
        subdivisions: Option<u32>,

        /// Leave the gaps between translated patches open
        #[arg(long)]
        no_connect: bool,

        /// JSON config file; command-line values override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compute tangent frames from raw position and index buffers
    Orient {
        /// Tightly packed f32 xyz positions
        #[arg(long)]
        positions: PathBuf,

        /// Tightly packed u16 triangle indices
        #[arg(long)]
        indices: PathBuf,

        /// Quaternion encoding
        #[arg(short, long, value_enum, default_value_t = QuatFormat::Short)]
        format: QuatFormat,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print vertex and triangle counts for every subdivision level
    Table,

    /// Load a binding manifest against the blobs in a directory
    Bindings {
        /// JSON manifest with `buffers` and `textures` arrays
        manifest: PathBuf,

        /// Directory blob URIs are relative to, defaults to the manifest's directory
        #[arg(long)]
        root: Option<PathBuf>,
    },
}

/// Tangent frame output encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum QuatFormat {
    Float,
    Half,
    Short,
}

/// Summary written next to generated buffers
#[derive(Debug, Serialize, Deserialize)]
pub struct MeshSummary {
    pub vertex_count: usize,
    pub index_count: usize,
    pub triangle_count: usize,
    pub bounds: Aabb,
    pub level: u32,
    pub config: OctasphereConfig,
}

impl MeshSummary {
    pub fn new(mesh: &MeshBuffers, config: &OctasphereConfig) -> Self {
        Self {
            vertex_count: mesh.vertex_count(),
            index_count: mesh.index_count(),
            triangle_count: mesh.triangle_count(),
            bounds: mesh.bounds(),
            level: config.level(),
            config: *config,
        }
    }
}

/// Resource bindings collected from an asset
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingManifest {
    pub buffers: Vec<BufferBinding>,
    pub textures: Vec<TextureBinding>,
}

/// Execute the CLI command
pub fn execute(cli: Cli) -> Result<()> {
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    run(cli.command)
}

/// Run one command without touching logger setup
pub fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Octasphere {
            width,
            height,
            depth,
            radius,
            subdivisions,
            no_connect,
            config,
            output,
        } => {
            let mut config = match config {
                Some(path) => load_config(&path)?,
                None => OctasphereConfig::default(),
            };
            config.width = width.unwrap_or(config.width);
            config.height = height.unwrap_or(config.height);
            config.depth = depth.unwrap_or(config.depth);
            config.radius = radius.unwrap_or(config.radius);
            config.subdivisions = subdivisions.unwrap_or(config.subdivisions);
            if no_connect {
                config.connect_patches = false;
            }

            let mesh = Octasphere::new(config)
                .generate()
                .context("Failed to generate octasphere")?;
            let summary = MeshSummary::new(&mesh, &config);
            log::info!(
                "Generated octasphere: {} vertices, {} triangles (level {})",
                summary.vertex_count,
                summary.triangle_count,
                summary.level
            );
            log::info!("  Bounds: {:?} .. {:?}", summary.bounds.min, summary.bounds.max);

            if let Some(output) = output {
                write_mesh(&output, &mesh, &summary)?;
                log::info!("  Output: {}", output.display());
            }
        }

        Commands::Orient {
            positions,
            indices,
            format,
            output,
        } => {
            let positions = read_positions(&positions)?;
            let triangles = read_triangles(&indices)?;
            let orientation = SurfaceOrientation::builder()
                .positions(&positions)
                .triangles_u16(&triangles)
                .build()
                .context("Failed to compute tangent frames")?;

            let bytes = encode_quats(&orientation, format);
            fs::write(&output, &bytes)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            log::info!(
                "Wrote {} tangent frames ({:?}, {} bytes) to {}",
                orientation.vertex_count(),
                format,
                bytes.len(),
                output.display()
            );
        }

        Commands::Table => {
            log::info!("level  vertices  triangles");
            for level in 0..=MAX_SUBDIVISIONS {
                log::info!(
                    "{:>5}  {:>8}  {:>9}",
                    level,
                    PATCH_COUNT * vertices_per_patch(level),
                    PATCH_COUNT * triangles_per_patch(level)
                );
            }
        }

        Commands::Bindings { manifest, root } => {
            let text = fs::read_to_string(&manifest)
                .with_context(|| format!("Failed to read {}", manifest.display()))?;
            let bindings: BindingManifest = serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse {}", manifest.display()))?;
            let root = root.unwrap_or_else(|| {
                manifest
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."))
            });

            let loader = ResourceLoader::new(FileBlobSource::new(root), RecordingUploader::new());
            loader.load_buffers(&bindings.buffers)?;
            loader.load_textures(&bindings.textures)?;
            let blobs = loader.release_blobs();
            log::info!(
                "Loaded {} uploads ({} bytes) from {} blobs",
                loader.uploader().upload_count(),
                loader.uploader().bytes_uploaded(),
                blobs
            );
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<OctasphereConfig> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Write `positions.bin`, `tangents.bin`, `indices.bin` and `mesh.json` into `dir`
pub fn write_mesh(dir: &Path, mesh: &MeshBuffers, summary: &MeshSummary) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let files: [(&str, &[u8]); 3] = [
        ("positions.bin", mesh.position_bytes()),
        ("tangents.bin", mesh.tangent_bytes()),
        ("indices.bin", mesh.index_bytes()),
    ];
    for (name, bytes) in files {
        let path = dir.join(name);
        fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    }

    let path = dir.join("mesh.json");
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn read_positions(path: &Path) -> Result<Vec<Vec3>> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    if bytes.len() % 12 != 0 {
        bail!("{}: {} bytes is not a whole number of xyz positions", path.display(), bytes.len());
    }
    Ok(bytes
        .chunks_exact(12)
        .map(|v| {
            let f = |i: usize| f32::from_ne_bytes([v[i], v[i + 1], v[i + 2], v[i + 3]]);
            Vec3::new(f(0), f(4), f(8))
        })
        .collect())
}

fn read_triangles(path: &Path) -> Result<Vec<[u16; 3]>> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    if bytes.len() % 6 != 0 {
        bail!("{}: {} bytes is not a whole number of u16 triangles", path.display(), bytes.len());
    }
    Ok(bytes
        .chunks_exact(6)
        .map(|t| {
            let i = |k: usize| u16::from_ne_bytes([t[k], t[k + 1]]);
            [i(0), i(2), i(4)]
        })
        .collect())
}

fn encode_quats(orientation: &SurfaceOrientation, format: QuatFormat) -> Vec<u8> {
    match format {
        QuatFormat::Float => bytemuck::cast_slice(&orientation.quats_as_float()).to_vec(),
        QuatFormat::Half => bytemuck::cast_slice(&orientation.quats_as_half()).to_vec(),
        QuatFormat::Short => bytemuck::cast_slice(&orientation.quats_as_short()).to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("facet-cli-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_cli_parse() {
        let cli = Cli::parse_from(["facet", "table"]);
        assert!(matches!(cli.command, Commands::Table));
        assert!(!cli.verbose);
    }

    #[test]
    fn test_octasphere_command() {
        let cli = Cli::parse_from([
            "facet", "-v", "octasphere", "--width", "2", "-r", "0.5", "-s", "2", "--no-connect",
        ]);
        assert!(cli.verbose);
        if let Commands::Octasphere {
            width,
            height,
            radius,
            subdivisions,
            no_connect,
            output,
            ..
        } = cli.command
        {
            assert_eq!(width, Some(2.0));
            assert_eq!(height, None);
            assert_eq!(radius, Some(0.5));
            assert_eq!(subdivisions, Some(2));
            assert!(no_connect);
            assert!(output.is_none());
        } else {
            panic!("Expected Octasphere command");
        }
    }

    #[test]
    fn test_orient_command() {
        let cli = Cli::parse_from([
            "facet", "orient", "--positions", "p.bin", "--indices", "i.bin", "-f", "half", "-o", "q.bin",
        ]);
        if let Commands::Orient { format, output, .. } = cli.command {
            assert_eq!(format, QuatFormat::Half);
            assert_eq!(output, PathBuf::from("q.bin"));
        } else {
            panic!("Expected Orient command");
        }
    }

    #[test]
    fn test_generate_and_orient() {
        let dir = temp_dir("generate");
        run(Commands::Octasphere {
            width: None,
            height: Some(3.0),
            depth: None,
            radius: Some(1.0),
            subdivisions: Some(2),
            no_connect: false,
            config: None,
            output: Some(dir.clone()),
        })
        .unwrap();

        let summary: MeshSummary =
            serde_json::from_str(&fs::read_to_string(dir.join("mesh.json")).unwrap()).unwrap();
        assert_eq!(summary.level, 2);
        assert_eq!(summary.config.height, 3.0);
        assert_eq!(
            fs::read(dir.join("positions.bin")).unwrap().len(),
            summary.vertex_count * 12
        );
        assert_eq!(fs::read(dir.join("tangents.bin")).unwrap().len(), summary.vertex_count * 8);
        assert_eq!(fs::read(dir.join("indices.bin")).unwrap().len(), summary.index_count * 2);

        let quats = dir.join("quats.bin");
        run(Commands::Orient {
            positions: dir.join("positions.bin"),
            indices: dir.join("indices.bin"),
            format: QuatFormat::Float,
            output: quats.clone(),
        })
        .unwrap();
        assert_eq!(fs::read(&quats).unwrap().len(), summary.vertex_count * 16);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_config_file_overridden_by_flags() {
        let dir = temp_dir("config");
        fs::create_dir_all(&dir).unwrap();
        let config = dir.join("capsule.json");
        fs::write(&config, r#"{ "radius": 0.5, "height": 4.0, "subdivisions": 1 }"#).unwrap();

        let loaded = load_config(&config).unwrap();
        assert_eq!(loaded.height, 4.0);
        assert!(loaded.connect_patches);

        let out = dir.join("mesh");
        run(Commands::Octasphere {
            width: None,
            height: None,
            depth: None,
            radius: None,
            subdivisions: Some(0),
            no_connect: false,
            config: Some(config),
            output: Some(out.clone()),
        })
        .unwrap();
        let summary: MeshSummary =
            serde_json::from_str(&fs::read_to_string(out.join("mesh.json")).unwrap()).unwrap();
        assert_eq!(summary.level, 0);
        assert_eq!(summary.config.radius, 0.5);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_orient_rejects_truncated_buffers() {
        let dir = temp_dir("truncated");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("p.bin"), [0u8; 10]).unwrap();
        fs::write(dir.join("i.bin"), [0u8; 6]).unwrap();

        let result = run(Commands::Orient {
            positions: dir.join("p.bin"),
            indices: dir.join("i.bin"),
            format: QuatFormat::Short,
            output: dir.join("q.bin"),
        });
        assert!(result.is_err());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_bindings_manifest() {
        let dir = temp_dir("bindings");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("mesh.bin"), [0u8; 32]).unwrap();
        let manifest = dir.join("bindings.json");
        fs::write(
            &manifest,
            r#"{ "buffers": [
                { "uri": "mesh.bin", "total_size": 32, "offset": 8, "size": 12, "index_buffer": 0 },
                { "uri": "mesh.bin", "total_size": 32, "offset": 0, "size": 6, "index_buffer": 1,
                  "convert_bytes_to_shorts": true }
            ] }"#,
        )
        .unwrap();

        run(Commands::Bindings { manifest: manifest.clone(), root: None }).unwrap();

        fs::write(
            &manifest,
            r#"{ "buffers": [ { "uri": "mesh.bin", "total_size": 32, "offset": 30, "size": 4, "index_buffer": 0 } ] }"#,
        )
        .unwrap();
        assert!(run(Commands::Bindings { manifest, root: None }).is_err());

        fs::remove_dir_all(&dir).unwrap();
    }
}
