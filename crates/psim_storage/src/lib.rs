use psim_core::{Error, FileFormat, Result, VectorN};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// Positions read back from a particle file
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud<V> {
    pub positions: Vec<V>,
    /// Only the BNN and Binary formats record a radius
    pub radius: Option<f32>,
}

/// BNN payload, serialized with bincode
#[derive(Serialize, Deserialize)]
struct PointSetSnapshot {
    dimension: u32,
    radius: f32,
    positions: Vec<f32>,
}

/// Binary header: dimension, count (u32 LE), radius (f32 LE)
const BINARY_HEADER_LEN: usize = 12;

/// Save positions to `path`, creating missing parent directories
pub fn save_particles<V: VectorN>(
    path: &Path,
    format: FileFormat,
    positions: &[V],
    radius: f32,
) -> Result<()> {
    let data = match format {
        FileFormat::Obj => encode_obj(positions).into_bytes(),
        FileFormat::Bnn => {
            let snapshot = PointSetSnapshot {
                dimension: V::DIM as u32,
                radius,
                positions: bytemuck::cast_slice::<V, f32>(positions).to_vec(),
            };
            bincode::serialize(&snapshot).map_err(|e| Error::Codec(format!("serialize: {e}")))?
        }
        FileFormat::Binary => encode_binary(positions, radius),
        FileFormat::Bgeo => return Err(Error::UnsupportedFormat(format)),
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, data)?;
    debug!(path = %path.display(), format = format.name(), count = positions.len(), "saved particles");
    Ok(())
}

/// Load positions from `path`. A missing file is `Ok(None)`.
pub fn load_particles<V: VectorN>(path: &Path, format: FileFormat) -> Result<Option<PointCloud<V>>> {
    if format == FileFormat::Bgeo {
        return Err(Error::UnsupportedFormat(format));
    }
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let cloud = match format {
        FileFormat::Obj => decode_obj(&data)?,
        FileFormat::Bnn => {
            let snapshot: PointSetSnapshot = bincode::deserialize(&data)
                .map_err(|e| Error::Codec(format!("deserialize: {e}")))?;
            check_dimension::<V>(snapshot.dimension)?;
            PointCloud {
                positions: to_vectors(&snapshot.positions)?,
                radius: Some(snapshot.radius),
            }
        }
        FileFormat::Binary => decode_binary(&data)?,
        FileFormat::Bgeo => return Err(Error::UnsupportedFormat(format)),
    };
    debug!(path = %path.display(), format = format.name(), count = cloud.positions.len(), "loaded particles");
    Ok(Some(cloud))
}

fn check_dimension<V: VectorN>(dimension: u32) -> Result<()> {
    if dimension as usize != V::DIM {
        return Err(Error::Codec(format!(
            "file holds {dimension}D points, expected {}D",
            V::DIM
        )));
    }
    Ok(())
}

fn to_vectors<V: VectorN>(values: &[f32]) -> Result<Vec<V>> {
    if values.len() % V::DIM != 0 {
        return Err(Error::Codec(format!(
            "{} values do not split into {}D points",
            values.len(),
            V::DIM
        )));
    }
    Ok(values
        .chunks_exact(V::DIM)
        .map(|c| V::from_fn(|i| c[i]))
        .collect())
}

fn encode_obj<V: VectorN>(positions: &[V]) -> String {
    let mut out = String::with_capacity(positions.len() * 32);
    for p in positions {
        out.push('v');
        for i in 0..V::DIM {
            out.push(' ');
            out.push_str(&p.axis(i).to_string());
        }
        out.push('\n');
    }
    out
}

fn decode_obj<V: VectorN>(data: &[u8]) -> Result<PointCloud<V>> {
    let text = std::str::from_utf8(data).map_err(|e| Error::Codec(format!("obj: {e}")))?;
    let mut positions = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let mut fields = line.split_whitespace();
        if fields.next() != Some("v") {
            continue;
        }
        let coords = fields
            .take(V::DIM)
            .map(str::parse::<f32>)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Codec(format!("obj line {}: {e}", line_no + 1)))?;
        if coords.len() != V::DIM {
            return Err(Error::Codec(format!(
                "obj line {}: expected {} coordinates",
                line_no + 1,
                V::DIM
            )));
        }
        positions.push(V::from_fn(|i| coords[i]));
    }
    Ok(PointCloud {
        positions,
        radius: None,
    })
}

fn encode_binary<V: VectorN>(positions: &[V], radius: f32) -> Vec<u8> {
    let values: &[f32] = bytemuck::cast_slice(positions);
    let mut out = Vec::with_capacity(BINARY_HEADER_LEN + values.len() * 4);
    out.extend_from_slice(&(V::DIM as u32).to_le_bytes());
    out.extend_from_slice(&(positions.len() as u32).to_le_bytes());
    out.extend_from_slice(&radius.to_le_bytes());
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

fn decode_binary<V: VectorN>(data: &[u8]) -> Result<PointCloud<V>> {
    if data.len() < BINARY_HEADER_LEN {
        return Err(Error::Codec("binary file shorter than its header".into()));
    }
    let word = |i: usize| [data[i], data[i + 1], data[i + 2], data[i + 3]];
    let dimension = u32::from_le_bytes(word(0));
    let count = u32::from_le_bytes(word(4)) as usize;
    let radius = f32::from_le_bytes(word(8));
    check_dimension::<V>(dimension)?;

    let body = &data[BINARY_HEADER_LEN..];
    if body.len() != count * V::DIM * 4 {
        return Err(Error::Codec(format!(
            "binary file declares {count} points but holds {} bytes of data",
            body.len()
        )));
    }
    let values: Vec<f32> = body
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Ok(PointCloud {
        positions: to_vectors(&values)?,
        radius: Some(radius),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec2, Vec3};

    fn sample() -> Vec<Vec3> {
        vec![
            Vec3::new(0.0, 1.0, 2.0),
            Vec3::new(-0.125, 0.5, 1e-3),
            Vec3::new(3.25, -4.0, 100.0),
        ]
    }

    #[test]
    fn test_round_trip_each_format() {
        let dir = tempfile::tempdir().unwrap();
        for format in [FileFormat::Obj, FileFormat::Bnn, FileFormat::Binary] {
            let path = dir.path().join("cache").join(format!("points.{}", format.name()));
            save_particles(&path, format, &sample(), 0.05).unwrap();

            let cloud = load_particles::<Vec3>(&path, format).unwrap().unwrap();
            assert_eq!(cloud.positions, sample(), "{format:?}");
            let expected_radius = if format == FileFormat::Obj { None } else { Some(0.05) };
            assert_eq!(cloud.radius, expected_radius);
        }
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.bnn");
        assert!(load_particles::<Vec2>(&path, FileFormat::Bnn).unwrap().is_none());
    }

    #[test]
    fn test_bgeo_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.bgeo");
        assert!(matches!(
            save_particles(&path, FileFormat::Bgeo, &sample(), 0.1),
            Err(Error::UnsupportedFormat(FileFormat::Bgeo))
        ));
        assert!(load_particles::<Vec3>(&path, FileFormat::Bgeo).is_err());
    }

    #[test]
    fn test_dimension_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.bin");
        save_particles(&path, FileFormat::Binary, &sample(), 0.1).unwrap();
        assert!(matches!(
            load_particles::<Vec2>(&path, FileFormat::Binary),
            Err(Error::Codec(_))
        ));
    }

    #[test]
    fn test_obj_skips_other_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mesh.obj");
        fs::write(&path, "# comment\nv 1 2\nvn 0 1\nf 1 2 3\nv 3 4\n").unwrap();
        let cloud = load_particles::<Vec2>(&path, FileFormat::Obj).unwrap().unwrap();
        assert_eq!(cloud.positions, vec![Vec2::new(1.0, 2.0), Vec2::new(3.0, 4.0)]);
    }

    #[test]
    fn test_truncated_binary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.bin");
        fs::write(&path, [3u8, 0, 0]).unwrap();
        assert!(matches!(
            load_particles::<Vec3>(&path, FileFormat::Binary),
            Err(Error::Codec(_))
        ));
    }
}
