use std::thread;
use std::sync::mpsc;
use std::sync::{ Arc, Mutex, RwLock };
use std::sync::atomic::{ AtomicBool, Ordering };

use log::{ debug, warn };

use crate::consts::RAYS_PER_CHUNK;
use crate::error::{ KernelError, Result };
use crate::intersect::intersect_world;
use crate::material::Material;
use crate::random::RandomStream;
use crate::ray::Ray;
use crate::shape::Shape;
use crate::source::SunSource;
use crate::transform::Transform;

/// A shape placed in the world with its material.
#[derive(Clone, Debug)]
pub struct Element {
    pub name: String,
    pub shape: Shape,
    pub material: Material,
    pub object_to_world: Transform,
}

/// Everything a trace reads. Immutable once published.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub elements: Vec<Element>,
}

/// What happened to one traced ray.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RayOutcome {
    Missed,

    /// Absorbed by the element at this index.
    Absorbed(usize),

    /// Reflected by the element at this index.
    Reflected(usize, Ray),
}

/// Traces a single bounce: nearest element hit, then its material.
pub fn trace_ray(snapshot: &Snapshot, ray: &Ray, rng: &mut RandomStream) -> Result<RayOutcome> {
    let mut nearest = None;
    let mut search = *ray;

    for (index, element) in snapshot.elements.iter().enumerate() {
        if let Some(hit) = intersect_world(&element.shape, &element.object_to_world, &search)? {
            search.tmax = hit.t;
            nearest = Some((index, hit));
        }
    }

    let (index, hit) = match nearest {
        Some(found) => found,
        None => return Ok(RayOutcome::Missed),
    };

    let dg = match hit.dg {
        Some(dg) => dg,
        None => return Ok(RayOutcome::Absorbed(index)),
    };

    Ok(match snapshot.elements[index].material.scatter(ray, &dg, rng) {
        Some(reflected) => RayOutcome::Reflected(index, reflected),
        None => RayOutcome::Absorbed(index),
    })
}

/// A value readers share while a writer swaps in replacements.
///
/// Readers `load` an `Arc` and keep using it for as long as they like; a
/// `publish` never changes what an earlier `load` returned.
#[derive(Debug)]
pub struct SnapshotCell<T> {
    current: RwLock<Arc<T>>,
}

impl<T> SnapshotCell<T> {
    pub fn new(value: T) -> SnapshotCell<T> {
        SnapshotCell { current: RwLock::new(Arc::new(value)) }
    }

    pub fn load(&self) -> Arc<T> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn publish(&self, value: T) {
        let value = Arc::new(value);
        match self.current.write() {
            Ok(mut guard) => *guard = value,
            Err(poisoned) => *poisoned.into_inner() = value,
        }
    }
}

/// Abandons the batches of the tracer it came from.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Stops work on the current batch and refuses new ones until `reset`.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// A contiguous run of rays of one batch.
struct Chunk {
    start: usize,
    end: usize,
    seed: u64,
    source: SunSource,
    snapshot: Arc<Snapshot>,
    cancel: CancelHandle,
    results: mpsc::Sender<Vec<(usize, Result<RayOutcome>)>>,
}

impl Chunk {
    fn run(self) {
        if self.cancel.is_cancelled() {
            return;
        }

        let outcomes = (self.start..self.end).map(|index| {
            let mut rng = RandomStream::for_ray(self.seed, index as u64);
            let ray = self.source.generate(&mut rng);

            (index, trace_ray(&self.snapshot, &ray, &mut rng))
        }).collect();

        // The batch may have been abandoned; nobody is listening then.
        let _ = self.results.send(outcomes);
    }
}

enum Message {
    Trace(Chunk),
    Terminate,
}

struct Worker {
    thread: Option<thread::JoinHandle<()>>,
}

impl Worker {
    fn new(id: usize, receiver: Arc<Mutex<mpsc::Receiver<Message>>>) -> Worker {
        let thread = thread::spawn(move || loop {
            // Obtain the next message; a broken channel ends the worker.
            let message = match receiver.lock() {
                Ok(guard) => guard.recv(),
                Err(_) => break,
            };

            match message {
                Ok(Message::Trace(chunk)) => chunk.run(),
                Ok(Message::Terminate) | Err(_) => {
                    debug!("worker {} exiting", id);
                    break;
                }
            }
        });

        Worker { thread: Some(thread) }
    }
}

pub struct ThreadPool {
    workers: Vec<Worker>,
    sender: mpsc::Sender<Message>,
}

impl ThreadPool {
    pub fn new(size: usize) -> Result<ThreadPool> {
        if size == 0 {
            return Err(KernelError::InvalidConfiguration(
                "worker pool needs at least one thread".to_string()
            ));
        }

        let (sender, receiver) = mpsc::channel();
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..size)
            .map(|id| Worker::new(id, Arc::clone(&receiver)))
            .collect();

        Ok(ThreadPool { workers, sender })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    fn execute(&self, message: Message) -> Result<()> {
        self.sender.send(message).map_err(|_| KernelError::WorkerPool(
            "all workers have stopped".to_string()
        ))
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        for _ in &self.workers {
            let _ = self.sender.send(Message::Terminate);
        }

        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                if thread.join().is_err() {
                    warn!("a tracing worker panicked");
                }
            }
        }
    }
}

/// Counts and reflected rays of one batch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchReport {
    pub traced: usize,
    pub missed: usize,
    pub absorbed: usize,

    /// Reflected rays with their index in the batch, in index order.
    pub reflected: Vec<(usize, Ray)>,

    /// Set when the batch was abandoned before every ray was traced.
    pub cancelled: bool,
}

impl BatchReport {
    pub fn reflected_fraction(&self) -> f64 {
        if self.traced == 0 {
            0.0
        } else {
            self.reflected.len() as f64 / self.traced as f64
        }
    }
}

/// Traces batches of sun rays on a worker pool.
///
/// Each batch reads the snapshot current when it starts; `publish` between
/// batches swaps in new geometry or materials without disturbing a batch in
/// flight.
pub struct Tracer {
    pool: ThreadPool,
    snapshot: SnapshotCell<Snapshot>,
    cancel: CancelHandle,
}

impl Tracer {
    pub fn new(threads: usize, snapshot: Snapshot) -> Result<Tracer> {
        Ok(Tracer {
            pool: ThreadPool::new(threads)?,
            snapshot: SnapshotCell::new(snapshot),
            cancel: CancelHandle { flag: Arc::new(AtomicBool::new(false)) },
        })
    }

    pub fn publish(&self, snapshot: Snapshot) {
        self.snapshot.publish(snapshot);
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.load()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Traces `rays` sun rays from `source`.
    ///
    /// Ray `i` draws from the random stream `(seed, i)`, so the report does
    /// not depend on the number of threads. The first ray that fails (an
    /// invalid ray reaching the intersection boundary) abandons the batch and
    /// its error is returned.
    pub fn trace_batch(&self, source: &SunSource, rays: usize, seed: u64) -> Result<BatchReport> {
        let snapshot = self.snapshot.load();
        let (sender, receiver) = mpsc::channel();

        debug!("dispatching {} rays over {} threads", rays, self.pool.size());

        for start in (0..rays).step_by(RAYS_PER_CHUNK) {
            self.pool.execute(Message::Trace(Chunk {
                start,
                end: (start + RAYS_PER_CHUNK).min(rays),
                seed,
                source: *source,
                snapshot: Arc::clone(&snapshot),
                cancel: self.cancel.clone(),
                results: sender.clone(),
            }))?;
        }
        drop(sender);

        let mut outcomes: Vec<(usize, RayOutcome)> = Vec::with_capacity(rays);
        for chunk in receiver.iter() {
            for (index, outcome) in chunk {
                match outcome {
                    Ok(outcome) => outcomes.push((index, outcome)),
                    Err(e) => {
                        self.abandon(&receiver);
                        return Err(e);
                    }
                }
            }
        }

        if outcomes.len() < rays && !self.cancel.is_cancelled() {
            return Err(KernelError::WorkerPool(
                format!("{} of {} rays were lost", rays - outcomes.len(), rays)
            ));
        }

        outcomes.sort_by_key(|(index, _)| *index);

        let mut report = BatchReport { traced: outcomes.len(), ..Default::default() };
        for (index, outcome) in outcomes {
            match outcome {
                RayOutcome::Missed => report.missed += 1,
                RayOutcome::Absorbed(_) => report.absorbed += 1,
                RayOutcome::Reflected(_, ray) => report.reflected.push((index, ray)),
            }
        }
        report.cancelled = report.traced < rays;

        debug!("batch done: {} traced, {} reflected", report.traced, report.reflected.len());
        Ok(report)
    }

    /// Lets the remaining chunks of a failed batch skip and waits for them
    /// to drop their senders. A cancel issued through a `CancelHandle`
    /// before this point still holds afterwards.
    fn abandon(&self, receiver: &mpsc::Receiver<Vec<(usize, Result<RayOutcome>)>>) {
        let already_cancelled = self.cancel.flag.swap(true, Ordering::SeqCst);

        for _ in receiver.iter() {}

        if !already_cancelled {
            self.cancel.reset();
        }
    }
}

/* Tests */

#[cfg(test)]
use crate::shape::SphericalRectangle;

#[cfg(test)]
use crate::tuple::Tuple4D;

#[cfg(test)]
fn mirror_patch() -> Snapshot {
    let mut material = Material::default();
    material.set_front_table(&[(0.0, 1.0), (1.5708, 1.0)]).unwrap();
    material.set_back_table(&[(0.0, 1.0), (1.5708, 1.0)]).unwrap();

    Snapshot {
        elements: vec![Element {
            name: "patch".to_string(),
            shape: SphericalRectangle::new(10.0, 1.0, 1.0).unwrap().into(),
            material,
            object_to_world: Transform::identity(),
        }],
    }
}

#[cfg(test)]
fn zenith_source(snapshot: &Snapshot) -> SunSource {
    let element = &snapshot.elements[0];
    let target = element.shape.bounding_box().transformed(&element.object_to_world);

    SunSource::new(&Tuple4D::vector(0.0, 1.0, 0.0), &target).unwrap()
}

#[test]
fn zenith_sun_reflects_every_ray_of_a_mirror() {
    let snapshot = mirror_patch();
    let source = zenith_source(&snapshot);
    let tracer = Tracer::new(2, snapshot).unwrap();

    let report = tracer.trace_batch(&source, 1000, 7).unwrap();

    assert_eq!(report.traced, 1000);
    assert_eq!(report.reflected.len(), 1000);
    assert_eq!((report.missed, report.absorbed), (0, 0));
    assert!(!report.cancelled);
    approx::assert_abs_diff_eq!(report.reflected_fraction(), 1.0);

    for (_, ray) in &report.reflected {
        assert!(ray.direction.y > 0.9);
    }
}

#[test]
fn reports_do_not_depend_on_thread_count() {
    let snapshot = mirror_patch();
    let source = zenith_source(&snapshot);

    let one = Tracer::new(1, snapshot.clone()).unwrap().trace_batch(&source, 700, 99).unwrap();
    let four = Tracer::new(4, snapshot).unwrap().trace_batch(&source, 700, 99).unwrap();

    assert_eq!(one, four);

    let indices: Vec<usize> = one.reflected.iter().map(|(i, _)| *i).collect();
    let mut sorted = indices.clone();
    sorted.sort_unstable();
    assert_eq!(indices, sorted);
}

#[test]
fn empty_world_misses_everything() {
    let source = zenith_source(&mirror_patch());
    let tracer = Tracer::new(3, Snapshot::default()).unwrap();

    let report = tracer.trace_batch(&source, 300, 1).unwrap();

    assert_eq!(report.missed, 300);
    assert!(report.reflected.is_empty());
}

#[test]
fn cancelled_tracer_abandons_batches_until_reset() {
    let snapshot = mirror_patch();
    let source = zenith_source(&snapshot);
    let tracer = Tracer::new(2, snapshot).unwrap();
    let handle = tracer.cancel_handle();

    handle.cancel();
    let report = tracer.trace_batch(&source, 1000, 3).unwrap();
    assert!(report.cancelled);
    assert_eq!(report.traced, 0);

    handle.reset();
    let report = tracer.trace_batch(&source, 1000, 3).unwrap();
    assert!(!report.cancelled);
    assert_eq!(report.traced, 1000);
}

#[test]
fn published_snapshot_applies_to_the_next_batch() {
    let snapshot = mirror_patch();
    let source = zenith_source(&snapshot);
    let tracer = Tracer::new(2, snapshot).unwrap();
    let before = tracer.snapshot();

    let mut dark = mirror_patch();
    dark.elements[0].material = Material::default();
    tracer.publish(dark);

    // The old snapshot stays intact for whoever still holds it.
    assert_eq!(before.elements[0].material.front().reflectivity_at(0.0), 1.0);

    let report = tracer.trace_batch(&source, 500, 11).unwrap();
    assert_eq!(report.absorbed, 500);
}

#[test]
fn nearest_element_wins() {
    let mut snapshot = mirror_patch();
    let mut lower = snapshot.elements[0].clone();
    lower.name = "lower".to_string();
    lower.object_to_world = Transform::new(crate::matrix::Matrix4D::translation(0.0, -1.0, 0.0)).unwrap();
    snapshot.elements.insert(0, lower);

    let ray = Ray::new(Tuple4D::point(0.1, 5.0, 0.1), Tuple4D::vector(0.0, -1.0, 0.0));
    let mut rng = RandomStream::new(5);

    match trace_ray(&snapshot, &ray, &mut rng).unwrap() {
        RayOutcome::Reflected(index, reflected) => {
            assert_eq!(index, 1);
            assert!(reflected.origin.y > -0.5);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[test]
fn failed_batch_keeps_a_user_cancel() {
    let tracer = Tracer::new(1, Snapshot::default()).unwrap();
    let handle = tracer.cancel_handle();

    let (sender, receiver) = mpsc::channel();
    drop(sender);
    tracer.abandon(&receiver);
    assert!(!handle.is_cancelled());

    let (sender, receiver) = mpsc::channel();
    drop(sender);
    handle.cancel();
    tracer.abandon(&receiver);
    assert!(handle.is_cancelled());
}

#[test]
fn zero_threads_is_a_configuration_error() {
    assert!(matches!(ThreadPool::new(0), Err(KernelError::InvalidConfiguration(_))));
}
