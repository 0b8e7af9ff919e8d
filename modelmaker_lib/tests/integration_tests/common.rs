use modelmaker_lib::backend::{
    DecimationParameters, GeometryBackend, NativeBackend, NormalsParameters, SmoothingParameters,
};
use modelmaker_lib::mesh::SurfaceMesh;
use modelmaker_lib::nalgebra::Matrix4;
use modelmaker_lib::pipeline::SkipReason;
use modelmaker_lib::{
    ExtractionEvent, ExtractionSink, GeometryError, Label, LabelVolume, ScalarType, SinkError,
};
use parking_lot::Mutex;
use std::ops::RangeInclusive;

/// An axis aligned box of voxels `[min, max)` with the given label
pub struct Block {
    pub label: Label,
    pub min: [usize; 3],
    pub max: [usize; 3],
}

pub fn block(label: Label, min: [usize; 3], max: [usize; 3]) -> Block {
    Block { label, min, max }
}

/// Background volume with the given blocks of labels, stored as 8 bit labels
pub fn block_volume(dimensions: [usize; 3], blocks: &[Block]) -> LabelVolume {
    let [nx, ny, _] = dimensions;
    let mut labels = vec![0; dimensions.iter().product()];
    for b in blocks {
        for k in b.min[2]..b.max[2] {
            for j in b.min[1]..b.max[1] {
                for i in b.min[0]..b.max[0] {
                    labels[i + nx * (j + ny * k)] = b.label;
                }
            }
        }
    }

    LabelVolume::new(dimensions, labels)
        .unwrap()
        .with_scalar_type(ScalarType::U8)
}

/// Native backend that records the name of every called operation
#[derive(Default)]
pub struct CountingBackend {
    pub calls: Mutex<Vec<&'static str>>,
}

impl CountingBackend {
    pub fn count(&self, operation: &str) -> usize {
        self.calls.lock().iter().filter(|&&c| c == operation).count()
    }

    fn record(&self, operation: &'static str) {
        self.calls.lock().push(operation);
    }
}

impl GeometryBackend<f64> for CountingBackend {
    fn threshold(&self, volume: &LabelVolume, label: Label) -> Result<LabelVolume, GeometryError> {
        self.record("threshold");
        GeometryBackend::<f64>::threshold(&NativeBackend, volume, label)
    }

    fn isosurface(
        &self,
        volume: &LabelVolume,
        range: RangeInclusive<Label>,
    ) -> Result<SurfaceMesh<f64>, GeometryError> {
        self.record("isosurface");
        NativeBackend.isosurface(volume, range)
    }

    fn threshold_mesh(
        &self,
        mesh: &SurfaceMesh<f64>,
        label: Label,
    ) -> Result<SurfaceMesh<f64>, GeometryError> {
        self.record("threshold_mesh");
        NativeBackend.threshold_mesh(mesh, label)
    }

    fn decimate(
        &self,
        mesh: SurfaceMesh<f64>,
        parameters: &DecimationParameters,
    ) -> Result<SurfaceMesh<f64>, GeometryError> {
        self.record("decimate");
        NativeBackend.decimate(mesh, parameters)
    }

    fn reverse_sense(&self, mesh: SurfaceMesh<f64>) -> Result<SurfaceMesh<f64>, GeometryError> {
        self.record("reverse_sense");
        NativeBackend.reverse_sense(mesh)
    }

    fn smooth(
        &self,
        mesh: SurfaceMesh<f64>,
        parameters: &SmoothingParameters,
    ) -> Result<SurfaceMesh<f64>, GeometryError> {
        self.record("smooth");
        NativeBackend.smooth(mesh, parameters)
    }

    fn transform(
        &self,
        mesh: SurfaceMesh<f64>,
        matrix: &Matrix4<f64>,
    ) -> Result<SurfaceMesh<f64>, GeometryError> {
        self.record("transform");
        NativeBackend.transform(mesh, matrix)
    }

    fn compute_normals(
        &self,
        mesh: SurfaceMesh<f64>,
        parameters: &NormalsParameters,
    ) -> Result<SurfaceMesh<f64>, GeometryError> {
        self.record("compute_normals");
        NativeBackend.compute_normals(mesh, parameters)
    }

    fn strip(&self, mesh: SurfaceMesh<f64>) -> Result<SurfaceMesh<f64>, GeometryError> {
        self.record("strip");
        NativeBackend.strip(mesh)
    }
}

/// What a sink observed, without the meshes
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Observed {
    Intermediate(Label, String),
    Produced(Label, String),
    Skipped(Label, SkipReason),
}

/// Sink recording the events of a run
#[derive(Default)]
pub struct EventLog {
    pub events: Vec<Observed>,
    pub signed_volumes: Vec<f64>,
}

impl ExtractionSink<f64> for EventLog {
    fn consume(&mut self, event: ExtractionEvent<'_, f64>) -> Result<(), SinkError> {
        let observed = match event {
            ExtractionEvent::Intermediate {
                label, name, kind, ..
            } => Observed::Intermediate(label, format!("{}{}", name, kind.suffix())),
            ExtractionEvent::Produced(result) => {
                self.signed_volumes.push(result.mesh.signed_volume());
                Observed::Produced(result.label, result.name)
            }
            ExtractionEvent::Skipped { label, reason } => Observed::Skipped(label, reason),
        };
        self.events.push(observed);
        Ok(())
    }
}
