//! Maze geometry: wall rectangles from an SVG level, extruded into prisms
//!
//! A level is an SVG whose first `<g>` group holds one element per wall,
//! each with `x`, `y`, `width` and `height` attributes. SVG `y` maps to world Z.

use std::path::Path;

use maze_engine::foundation::math::{Vec3, Vec4};
use maze_engine::physics::collision::CollisionRect;
use maze_engine::render::Mesh;

use crate::error::MazeError;

/// Height of every wall prism
pub const WALL_HEIGHT: f32 = 30.0;

/// Height of the floor quad, just below the walls
pub const FLOOR_OFFSET_Y: f32 = -1.5;

/// Wall color
pub const WALL_COLOR: [f32; 4] = [0.0, 0.0, 1.0, 1.0];

/// Floor color
pub const FLOOR_COLOR: [f32; 4] = [0.1, 0.1, 0.1, 1.0];

/// The static walls of a level
#[derive(Debug, Clone, PartialEq)]
pub struct Maze {
    walls: Vec<CollisionRect>,
}

impl Maze {
    /// Maze from explicit walls
    pub fn from_walls(walls: Vec<CollisionRect>) -> Result<Self, MazeError> {
        if walls.is_empty() {
            return Err(MazeError::Empty);
        }
        Ok(Self { walls })
    }

    /// Load a level file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, MazeError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| MazeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let maze = Self::parse(&text)?;
        log::info!("Loaded {} walls from {}", maze.walls.len(), path.display());
        Ok(maze)
    }

    /// Parse level SVG text
    pub fn parse(svg: &str) -> Result<Self, MazeError> {
        let document = roxmltree::Document::parse(svg)?;
        let root = document.root_element();
        if root.tag_name().name() != "svg" {
            return Err(MazeError::MissingElement("svg"));
        }
        let group = root
            .children()
            .find(|node| node.is_element() && node.tag_name().name() == "g")
            .ok_or(MazeError::MissingElement("g"))?;

        let walls = group
            .children()
            .filter(roxmltree::Node::is_element)
            .map(|element| {
                let wall = CollisionRect::new(
                    attribute(&element, "x")?,
                    attribute(&element, "y")?,
                    attribute(&element, "width")?,
                    attribute(&element, "height")?,
                );
                if wall.width < 0.0 || wall.height < 0.0 {
                    return Err(MazeError::InvalidAttribute {
                        attribute: if wall.width < 0.0 { "width" } else { "height" },
                        value: format!("{}x{}", wall.width, wall.height),
                    });
                }
                log::trace!("Wall {}: {:?}", element.attribute("id").unwrap_or("?"), wall);
                Ok(wall)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::from_walls(walls)
    }

    /// Wall rectangles for collision queries
    pub fn walls(&self) -> &[CollisionRect] {
        &self.walls
    }

    /// Bounding rectangle of all walls
    pub fn bounds(&self) -> CollisionRect {
        CollisionRect::bounding(&self.walls).unwrap_or_default()
    }

    /// Render mesh: six quads per wall and one floor quad under everything
    ///
    /// Quads go front (min X), right (max Z), back (max X), left (min Z), top,
    /// bottom, each with an outward normal.
    pub fn mesh(&self) -> Mesh {
        let mut mesh = Mesh::default();
        let color = Vec4::from(WALL_COLOR);
        let h = WALL_HEIGHT;

        for wall in &self.walls {
            let (x0, x1) = (wall.x, wall.max_x());
            let (z0, z1) = (wall.y, wall.max_y());
            let faces = [
                [Vec3::new(x0, 0.0, z0), Vec3::new(x0, 0.0, z1), Vec3::new(x0, h, z1), Vec3::new(x0, h, z0)],
                [Vec3::new(x0, 0.0, z1), Vec3::new(x1, 0.0, z1), Vec3::new(x1, h, z1), Vec3::new(x0, h, z1)],
                [Vec3::new(x1, 0.0, z1), Vec3::new(x1, 0.0, z0), Vec3::new(x1, h, z0), Vec3::new(x1, h, z1)],
                [Vec3::new(x1, 0.0, z0), Vec3::new(x0, 0.0, z0), Vec3::new(x0, h, z0), Vec3::new(x1, h, z0)],
                [Vec3::new(x0, h, z0), Vec3::new(x0, h, z1), Vec3::new(x1, h, z1), Vec3::new(x1, h, z0)],
                [Vec3::new(x1, 0.0, z0), Vec3::new(x1, 0.0, z1), Vec3::new(x0, 0.0, z1), Vec3::new(x0, 0.0, z0)],
            ];
            for corners in faces {
                mesh.push_quad(corners, color, face_normal(&corners));
            }
        }

        let bounds = self.bounds();
        let y = FLOOR_OFFSET_Y;
        let floor = [
            Vec3::new(bounds.x, y, bounds.max_y()),
            Vec3::new(bounds.max_x(), y, bounds.max_y()),
            Vec3::new(bounds.max_x(), y, bounds.y),
            Vec3::new(bounds.x, y, bounds.y),
        ];
        mesh.push_quad(floor, Vec4::from(FLOOR_COLOR), face_normal(&floor));
        mesh
    }
}

fn attribute(element: &roxmltree::Node<'_, '_>, name: &'static str) -> Result<f32, MazeError> {
    let value = element.attribute(name).ok_or_else(|| MazeError::MissingAttribute {
        element: element.tag_name().name().to_string(),
        attribute: name,
    })?;
    value.trim().parse().map_err(|_| MazeError::InvalidAttribute {
        attribute: name,
        value: value.to_string(),
    })
}

/// Negated average of the normals of triangles (0,1,2) and (0,2,3)
fn face_normal(corners: &[Vec3; 4]) -> Vec3 {
    let [v0, v1, v2, v3] = corners;
    let first = (v2 - v0).cross(&(v1 - v2)).normalize();
    let second = (v3 - v0).cross(&(v2 - v0)).normalize();
    -(first + second) * 0.5
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const LEVEL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="800" height="800">
  <title>test level</title>
  <g id="walls">
    <rect id="a" x="0" y="0" width="800" height="20"/>
    <rect id="b" x="100" y="200" width="40" height="120"/>
  </g>
</svg>"#;

    #[test]
    fn test_parse_walls() {
        let maze = Maze::parse(LEVEL).unwrap();
        assert_eq!(
            maze.walls(),
            &[CollisionRect::new(0.0, 0.0, 800.0, 20.0), CollisionRect::new(100.0, 200.0, 40.0, 120.0)]
        );
        assert_eq!(maze.bounds(), CollisionRect::new(0.0, 0.0, 800.0, 320.0));
    }

    #[test]
    fn test_bundled_level_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("resources/levels/level1.svg");
        let maze = Maze::load(path).unwrap();
        assert_eq!(maze.bounds(), CollisionRect::new(0.0, 0.0, 800.0, 800.0));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(Maze::parse("<svg"), Err(MazeError::Xml(_))));
        assert!(matches!(Maze::parse("<svg/>"), Err(MazeError::MissingElement("g"))));
        assert!(matches!(Maze::parse("<html><g/></html>"), Err(MazeError::MissingElement("svg"))));
        assert!(matches!(Maze::parse("<svg><g/></svg>"), Err(MazeError::Empty)));
        assert!(matches!(
            Maze::parse(r#"<svg><g><rect x="1" y="2" width="3"/></g></svg>"#),
            Err(MazeError::MissingAttribute { attribute: "height", .. })
        ));
        assert!(matches!(
            Maze::parse(r#"<svg><g><rect x="1" y="2" width="wide" height="4"/></g></svg>"#),
            Err(MazeError::InvalidAttribute { attribute: "width", .. })
        ));
        assert!(matches!(
            Maze::parse(r#"<svg><g><rect x="1" y="2" width="3" height="-4"/></g></svg>"#),
            Err(MazeError::InvalidAttribute { attribute: "height", .. })
        ));
        assert!(matches!(
            Maze::load("no/such/level.svg"),
            Err(MazeError::Io { .. })
        ));
    }

    #[test]
    fn test_mesh_counts_and_winding() {
        let maze = Maze::parse(LEVEL).unwrap();
        let mesh = maze.mesh();
        assert_eq!(mesh.vertices.len(), 2 * 24 + 4);
        assert_eq!(mesh.indices.len(), 2 * 36 + 6);
        for (quad, chunk) in mesh.indices.chunks(6).enumerate() {
            let k = quad as u32 * 4;
            assert_eq!(chunk, &[k, k + 1, k + 2, k, k + 2, k + 3]);
        }
    }

    #[test]
    fn test_wall_normals_point_outward() {
        let maze = Maze::from_walls(vec![CollisionRect::new(100.0, 200.0, 40.0, 120.0)]).unwrap();
        let mesh = maze.mesh();
        let center = Vec3::new(120.0, WALL_HEIGHT * 0.5, 260.0);
        let expected = [-Vec3::x(), Vec3::z(), Vec3::x(), -Vec3::z(), Vec3::y(), -Vec3::y()];

        for (face, quad) in mesh.vertices[..24].chunks(4).enumerate() {
            let normal = Vec3::new(quad[0].normal[0], quad[0].normal[1], quad[0].normal[2]);
            let centroid = quad.iter().map(|v| v.position3()).sum::<Vec3>() / 4.0;
            assert_relative_eq!(normal, expected[face], epsilon = 1e-6);
            assert!(normal.dot(&(centroid - center)) > 0.0);
            assert!(quad.iter().all(|v| v.color == WALL_COLOR));
        }
    }

    #[test]
    fn test_floor_spans_wall_bounds() {
        let maze = Maze::parse(LEVEL).unwrap();
        let mesh = maze.mesh();
        let floor = &mesh.vertices[mesh.vertices.len() - 4..];
        let corners: Vec<Vec3> = floor.iter().map(|v| v.position3()).collect();
        assert_eq!(
            corners,
            vec![
                Vec3::new(0.0, FLOOR_OFFSET_Y, 320.0),
                Vec3::new(800.0, FLOOR_OFFSET_Y, 320.0),
                Vec3::new(800.0, FLOOR_OFFSET_Y, 0.0),
                Vec3::new(0.0, FLOOR_OFFSET_Y, 0.0),
            ]
        );
        assert_relative_eq!(Vec3::new(floor[0].normal[0], floor[0].normal[1], floor[0].normal[2]), Vec3::y());
        assert_eq!(floor[0].color, FLOOR_COLOR);
    }
}
