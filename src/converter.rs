use std::collections::HashMap;

use geo::{Coord, Geometry, Polygon};

// A node is created the first time its exact coordinate pair is seen and is
// never mutated afterwards. Coordinates are WGS84 lon/lat once reprojection
// has run, so x maps to `lon` and y to `lat` in the output.
#[derive(Debug, Clone, PartialEq)]
pub struct OsmNode {
    pub id: i64,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OsmWay {
    pub id: i64,
    pub node_refs: Vec<i64>,
}

// Owns the identifier counter and the coordinate->node map for one
// conversion run. Identifiers start at -1 and decrease on every new node or
// way, so every element carries a unique negative id ("not yet uploaded" in
// OSM convention) from a single shared counter.
pub struct Converter {
    next_id: i64,
    node_ids: HashMap<(u64, u64), i64>,
    nodes: Vec<OsmNode>,
    ways: Vec<OsmWay>,
}

impl Converter {
    pub fn new() -> Self {
        Converter {
            next_id: -1,
            node_ids: HashMap::new(),
            nodes: Vec::new(),
            ways: Vec::new(),
        }
    }

    fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id -= 1;
        id
    }

    // Returns the id of the node at (x, y), creating it on first sight.
    // Lookup is on the exact bit pattern: equal coordinates share one node,
    // nothing is snapped or merged within any tolerance.
    pub fn resolve_node(&mut self, x: f64, y: f64) -> i64 {
        let key = (x.to_bits(), y.to_bits());
        if let Some(&id) = self.node_ids.get(&key) {
            return id;
        }
        let id = self.allocate_id();
        self.node_ids.insert(key, id);
        self.nodes.push(OsmNode { id, x, y });
        id
    }

    // Decomposes a geometry into its sub-geometries and routes each by
    // topological dimension: points become standalone nodes, everything
    // else becomes one way per point sequence. Polygon rings are emitted as
    // independent ways, interiors indistinguishable from the exterior.
    pub fn flatten(&mut self, geometry: &Geometry<f64>) {
        match geometry {
            Geometry::Point(point) => {
                self.resolve_node(point.x(), point.y());
            }
            Geometry::MultiPoint(points) => {
                for point in &points.0 {
                    self.resolve_node(point.x(), point.y());
                }
            }
            Geometry::Line(line) => self.add_way(&[line.start, line.end]),
            Geometry::LineString(line) => self.add_way(&line.0),
            Geometry::MultiLineString(lines) => {
                for line in &lines.0 {
                    self.add_way(&line.0);
                }
            }
            Geometry::Polygon(polygon) => self.add_polygon_rings(polygon),
            Geometry::MultiPolygon(polygons) => {
                for polygon in &polygons.0 {
                    self.add_polygon_rings(polygon);
                }
            }
            Geometry::GeometryCollection(collection) => {
                for child in &collection.0 {
                    self.flatten(child);
                }
            }
            Geometry::Rect(rect) => self.add_polygon_rings(&rect.to_polygon()),
            Geometry::Triangle(triangle) => self.add_polygon_rings(&triangle.to_polygon()),
        }
    }

    // Way id is allocated before the node ids of any points it introduces,
    // matching the counter order of elements as they are encountered.
    fn add_way(&mut self, points: &[Coord<f64>]) {
        let id = self.allocate_id();
        let node_refs = points
            .iter()
            .map(|coord| self.resolve_node(coord.x, coord.y))
            .collect();
        self.ways.push(OsmWay { id, node_refs });
    }

    fn add_polygon_rings(&mut self, polygon: &Polygon<f64>) {
        self.add_way(&polygon.exterior().0);
        for ring in polygon.interiors() {
            self.add_way(&ring.0);
        }
    }

    pub fn nodes(&self) -> &[OsmNode] {
        &self.nodes
    }

    pub fn ways(&self) -> &[OsmWay] {
        &self.ways
    }
}

impl Default for Converter {
    fn default() -> Self {
        Converter::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, point, polygon, Geometry, GeometryCollection, MultiPoint};

    #[test]
    fn coincident_coordinates_share_one_node() {
        let mut converter = Converter::new();
        let first = converter.resolve_node(10.0, 20.0);
        let second = converter.resolve_node(10.0, 20.0);
        assert_eq!(first, second);
        assert_eq!(converter.nodes().len(), 1);
        assert_eq!(converter.nodes()[0].x, 10.0);
        assert_eq!(converter.nodes()[0].y, 20.0);
    }

    #[test]
    fn distinct_coordinates_get_distinct_negative_ids() {
        let mut converter = Converter::new();
        let a = converter.resolve_node(1.0, 1.0);
        let b = converter.resolve_node(1.0, 2.0);
        let c = converter.resolve_node(2.0, 1.0);
        assert_eq!(a, -1);
        assert_eq!(b, -2);
        assert_eq!(c, -3);
    }

    #[test]
    fn point_produces_one_node_and_no_way() {
        let mut converter = Converter::new();
        converter.flatten(&Geometry::Point(point!(x: 5.0, y: 5.0)));
        assert_eq!(converter.nodes().len(), 1);
        assert!(converter.ways().is_empty());
    }

    #[test]
    fn linestring_produces_one_way_referencing_every_point() {
        let mut converter = Converter::new();
        let line = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 2.0, y: 0.0)];
        converter.flatten(&Geometry::LineString(line));
        assert_eq!(converter.ways().len(), 1);
        assert_eq!(converter.ways()[0].node_refs.len(), 3);
        assert_eq!(converter.nodes().len(), 3);
    }

    #[test]
    fn closed_ring_repeats_the_first_node_ref() {
        let mut converter = Converter::new();
        let ring = line_string![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ];
        converter.flatten(&Geometry::LineString(ring));
        let way = &converter.ways()[0];
        assert_eq!(way.node_refs.len(), 4);
        assert_eq!(way.node_refs[0], way.node_refs[3]);
        assert_eq!(converter.nodes().len(), 3);
    }

    #[test]
    fn polygon_interior_rings_become_independent_ways() {
        let mut converter = Converter::new();
        let polygon = polygon!(
            exterior: [
                (x: 0.0, y: 0.0),
                (x: 10.0, y: 0.0),
                (x: 10.0, y: 10.0),
                (x: 0.0, y: 10.0),
                (x: 0.0, y: 0.0),
            ],
            interiors: [[
                (x: 4.0, y: 4.0),
                (x: 6.0, y: 4.0),
                (x: 6.0, y: 6.0),
                (x: 4.0, y: 4.0),
            ]],
        );
        converter.flatten(&Geometry::Polygon(polygon));
        assert_eq!(converter.ways().len(), 2);
    }

    #[test]
    fn adjacent_polygons_share_boundary_nodes() {
        let mut converter = Converter::new();
        let left = polygon![
            (x: 0.0, y: 0.0),
            (x: 10.0, y: 20.0),
            (x: 0.0, y: 20.0),
            (x: 0.0, y: 0.0),
        ];
        let right = polygon![
            (x: 10.0, y: 20.0),
            (x: 20.0, y: 0.0),
            (x: 20.0, y: 20.0),
            (x: 10.0, y: 20.0),
        ];
        converter.flatten(&Geometry::Polygon(left));
        converter.flatten(&Geometry::Polygon(right));

        let shared: Vec<_> = converter
            .nodes()
            .iter()
            .filter(|n| n.x == 10.0 && n.y == 20.0)
            .collect();
        assert_eq!(shared.len(), 1);

        let shared_id = shared[0].id;
        assert_eq!(converter.ways().len(), 2);
        for way in converter.ways() {
            assert!(way.node_refs.contains(&shared_id));
        }
    }

    #[test]
    fn node_and_way_ids_never_overlap() {
        let mut converter = Converter::new();
        converter.flatten(&Geometry::Point(point!(x: 3.0, y: 4.0)));
        converter.flatten(&Geometry::LineString(
            line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)],
        ));

        let mut ids: Vec<i64> = converter.nodes().iter().map(|n| n.id).collect();
        ids.extend(converter.ways().iter().map(|w| w.id));
        let before = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), before);
        assert!(ids.iter().all(|&id| id < 0));
    }

    #[test]
    fn collection_expands_into_its_children() {
        let mut converter = Converter::new();
        let collection = GeometryCollection::from(vec![
            Geometry::Point(point!(x: 1.0, y: 1.0)),
            Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)]),
        ]);
        converter.flatten(&Geometry::GeometryCollection(collection));
        assert_eq!(converter.ways().len(), 1);
        // (1,1) appears both standalone and in the way; still one node.
        assert_eq!(converter.nodes().len(), 2);
    }

    #[test]
    fn empty_ring_still_allocates_a_way() {
        let mut converter = Converter::new();
        let polygon = Polygon::new(geo::LineString::new(Vec::new()), Vec::new());
        converter.flatten(&Geometry::Polygon(polygon));
        assert_eq!(converter.ways().len(), 1);
        assert!(converter.ways()[0].node_refs.is_empty());
        assert!(converter.nodes().is_empty());
    }

    #[test]
    fn two_runs_over_the_same_input_assign_identical_ids() {
        let geometries = vec![
            Geometry::Point(point!(x: 5.0, y: 5.0)),
            Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 5.0, y: 5.0)]),
            Geometry::Polygon(polygon![
                (x: 0.0, y: 0.0),
                (x: 10.0, y: 20.0),
                (x: 0.0, y: 20.0),
                (x: 0.0, y: 0.0),
            ]),
        ];

        let mut first = Converter::new();
        let mut second = Converter::new();
        for geometry in &geometries {
            first.flatten(geometry);
        }
        for geometry in &geometries {
            second.flatten(geometry);
        }

        assert_eq!(first.nodes(), second.nodes());
        assert_eq!(first.ways(), second.ways());
    }

    #[test]
    fn multipoint_creates_one_node_per_distinct_point() {
        let mut converter = Converter::new();
        let points = MultiPoint::from(vec![
            point!(x: 1.0, y: 1.0),
            point!(x: 2.0, y: 2.0),
            point!(x: 1.0, y: 1.0),
        ]);
        converter.flatten(&Geometry::MultiPoint(points));
        assert_eq!(converter.nodes().len(), 2);
        assert!(converter.ways().is_empty());
    }
}
