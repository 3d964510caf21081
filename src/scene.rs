// Demo geometry

use glam::{Vec3, Vec4};

use crate::backend::Vertex;

/// Deeper levels grow by 3x each and stop being worth uploading.
pub const MAX_SIERPINSKI_DEPTH: u32 = 10;

/// A red/green/blue triangle subdivided `depth` times, as a triangle list of
/// 3^(depth + 1) vertices. Depth is capped at `MAX_SIERPINSKI_DEPTH`.
pub fn sierpinski(depth: u32) -> Vec<Vertex> {
    let depth = depth.min(MAX_SIERPINSKI_DEPTH);
    let corners = [
        Vertex::new(Vec3::new(0.0, -0.5, 0.0), Vec4::new(1.0, 0.0, 0.0, 1.0)),
        Vertex::new(Vec3::new(0.5, 0.5, 0.0), Vec4::new(0.0, 1.0, 0.0, 1.0)),
        Vertex::new(Vec3::new(-0.5, 0.5, 0.0), Vec4::new(0.0, 0.0, 1.0, 1.0)),
    ];

    let mut vertices = Vec::with_capacity(3usize.pow(depth + 1));
    subdivide(&mut vertices, corners, depth);
    vertices
}

fn subdivide(out: &mut Vec<Vertex>, [a, b, c]: [Vertex; 3], depth: u32) {
    if depth == 0 {
        out.extend([a, b, c]);
        return;
    }

    let ab = midpoint(&a, &b);
    let bc = midpoint(&b, &c);
    let ca = midpoint(&c, &a);

    subdivide(out, [a, ab, ca], depth - 1);
    subdivide(out, [ab, b, bc], depth - 1);
    subdivide(out, [ca, bc, c], depth - 1);
}

fn midpoint(a: &Vertex, b: &Vertex) -> Vertex {
    let position = Vec3::from(a.position).lerp(Vec3::from(b.position), 0.5);
    let color = Vec4::from(a.color).lerp(Vec4::from(b.color), 0.5);
    Vertex::new(position, color)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_zero_is_one_triangle() {
        let vertices = sierpinski(0);
        assert_eq!(vertices.len(), 3);
        assert_eq!(vertices[0].position, [0.0, -0.5, 0.0]);
        assert_eq!(vertices[0].color, [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn each_level_triples_the_vertex_count() {
        for depth in 0..6 {
            assert_eq!(sierpinski(depth).len(), 3usize.pow(depth + 1));
        }
    }

    #[test]
    fn depth_is_capped() {
        assert_eq!(
            sierpinski(MAX_SIERPINSKI_DEPTH + 5).len(),
            3usize.pow(MAX_SIERPINSKI_DEPTH + 1)
        );
    }

    #[test]
    fn subdivided_vertices_stay_inside_the_base_triangle() {
        for vertex in sierpinski(3) {
            let [x, y, z] = vertex.position;
            assert!((-0.5..=0.5).contains(&x));
            assert!((-0.5..=0.5).contains(&y));
            assert_eq!(z, 0.0);
            assert_eq!(vertex.color[3], 1.0);
        }
    }

    #[test]
    fn first_level_corner_triangle_uses_midpoints() {
        let vertices = sierpinski(1);
        // [a, ab, ca]
        assert_eq!(vertices[1].position, [0.25, 0.0, 0.0]);
        assert_eq!(vertices[2].position, [-0.25, 0.0, 0.0]);
        assert_eq!(vertices[1].color, [0.5, 0.5, 0.0, 1.0]);
    }
}
