//! Base icosahedron the hierarchy is rooted on

use crate::core::Vec3;

/// Number of root faces
pub const ICOSAHEDRON_FACE_COUNT: u32 = 20;

/// Number of base vertices
pub const ICOSAHEDRON_VERTEX_COUNT: u32 = 12;

/// Golden ratio
const PHI: f32 = 1.618_034;

/// Faces as corner triples, counter-clockwise seen from outside
pub const ICOSAHEDRON_FACES: [[u32; 3]; 20] = [
    [0, 11, 5], [0, 5, 1], [0, 1, 7], [0, 7, 10], [0, 10, 11],
    [1, 5, 9], [5, 11, 4], [11, 10, 2], [10, 7, 6], [7, 1, 8],
    [3, 9, 4], [3, 4, 2], [3, 2, 6], [3, 6, 8], [3, 8, 9],
    [4, 9, 5], [2, 4, 11], [6, 2, 10], [8, 6, 7], [9, 8, 1],
];

/// Base vertices on the unit sphere
pub fn icosahedron_vertices() -> [Vec3; 12] {
    [
        Vec3::new(-1.0, PHI, 0.0).normalize(),
        Vec3::new(1.0, PHI, 0.0).normalize(),
        Vec3::new(-1.0, -PHI, 0.0).normalize(),
        Vec3::new(1.0, -PHI, 0.0).normalize(),
        Vec3::new(0.0, -1.0, PHI).normalize(),
        Vec3::new(0.0, 1.0, PHI).normalize(),
        Vec3::new(0.0, -1.0, -PHI).normalize(),
        Vec3::new(0.0, 1.0, -PHI).normalize(),
        Vec3::new(PHI, 0.0, -1.0).normalize(),
        Vec3::new(PHI, 0.0, 1.0).normalize(),
        Vec3::new(-PHI, 0.0, -1.0).normalize(),
        Vec3::new(-PHI, 0.0, 1.0).normalize(),
    ]
}

/// For every face and side, the neighbouring face and its facing side.
///
/// Side `s` of a face runs from corner `s + 1` to corner `s + 2`; the
/// neighbour traverses the same edge in the opposite direction.
pub fn face_neighbours() -> [[(u32, u8); 3]; 20] {
    let mut out = [[(u32::MAX, 0u8); 3]; 20];
    for (f, face) in ICOSAHEDRON_FACES.iter().enumerate() {
        for s in 0..3 {
            let a = face[(s + 1) % 3];
            let b = face[(s + 2) % 3];
            for (g, other) in ICOSAHEDRON_FACES.iter().enumerate() {
                if g == f {
                    continue;
                }
                for r in 0..3 {
                    if other[(r + 1) % 3] == b && other[(r + 2) % 3] == a {
                        out[f][s] = (g as u32, r as u8);
                    }
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertices_on_unit_sphere() {
        for v in icosahedron_vertices() {
            assert!((v.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_faces_wound_outward() {
        let verts = icosahedron_vertices();
        for face in ICOSAHEDRON_FACES {
            let [a, b, c] = face.map(|i| verts[i as usize]);
            let normal = (b - a).cross(c - a);
            let centroid = (a + b + c) / 3.0;
            assert!(normal.dot(centroid) > 0.0, "face {:?} wound inward", face);
        }
    }

    #[test]
    fn test_every_side_has_one_neighbour() {
        let neighbours = face_neighbours();
        for (f, sides) in neighbours.iter().enumerate() {
            for (s, &(g, r)) in sides.iter().enumerate() {
                assert_ne!(g, u32::MAX, "face {} side {} has no neighbour", f, s);
                // Link is symmetric
                assert_eq!(neighbours[g as usize][r as usize], (f as u32, s as u8));
            }
        }
    }
}
