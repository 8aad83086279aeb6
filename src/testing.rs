//! In-memory collaborators for host tests.

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::drivers::{Console, Machine};
use crate::fs::{FileSystem, FsLock, OpenFile};
use crate::mm::{PageFlags, UserMemory, VirtAddr, PAGE_SIZE, PHYS_BASE};
use crate::process::{LoadError, Pid, Process, SpawnError, SpawnRequest, Spawner};
use crate::syscall::{Disposition, TrapFrame};
use crate::{Kernel, KernelConfig};

// ---------------------------------------------------------------------------
// Allocation tracking
// ---------------------------------------------------------------------------

/// The system allocator, remembering the largest request made on each thread.
struct TrackingAlloc;

thread_local! {
    static LARGEST_ALLOCATION: Cell<usize> = const { Cell::new(0) };
}

fn note_allocation(size: usize) {
    let _ = LARGEST_ALLOCATION.try_with(|largest| {
        if size > largest.get() {
            largest.set(size);
        }
    });
}

unsafe impl GlobalAlloc for TrackingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        note_allocation(layout.size());
        // SAFETY: forwarded unchanged from the caller's contract
        unsafe { System.alloc(layout) }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        note_allocation(layout.size());
        // SAFETY: forwarded unchanged from the caller's contract
        unsafe { System.alloc_zeroed(layout) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        note_allocation(new_size);
        // SAFETY: forwarded unchanged from the caller's contract
        unsafe { System.realloc(ptr, layout, new_size) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        // SAFETY: forwarded unchanged from the caller's contract
        unsafe { System.dealloc(ptr, layout) }
    }
}

#[global_allocator]
static ALLOCATOR: TrackingAlloc = TrackingAlloc;

/// Forget allocations made so far on this thread.
pub fn reset_largest_allocation() {
    LARGEST_ALLOCATION.with(|largest| largest.set(0));
}

/// Largest single allocation on this thread since the last reset.
pub fn largest_allocation() -> usize {
    LARGEST_ALLOCATION.with(Cell::get)
}

// ---------------------------------------------------------------------------
// User memory
// ---------------------------------------------------------------------------

/// A sparse user address space.
///
/// `load`/`store` panic on any byte that is not mapped with the needed
/// flags, so a test fails loudly if the kernel ever touches user memory
/// the validator did not approve.
#[derive(Default)]
pub struct FakeMemory {
    pages: BTreeMap<u32, (PageFlags, Box<[u8; PAGE_SIZE as usize]>)>,
}

impl FakeMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(&mut self, page: VirtAddr, flags: PageFlags) {
        self.pages
            .insert(page.align_down().as_u32(), (flags, Box::new([0; PAGE_SIZE as usize])));
    }

    fn slot(&self, addr: u32) -> Option<&(PageFlags, Box<[u8; PAGE_SIZE as usize]>)> {
        self.pages.get(&(addr & !(PAGE_SIZE - 1)))
    }

    /// Test setup: write bytes regardless of page permissions.
    pub fn write(&mut self, addr: VirtAddr, bytes: &[u8]) {
        for (i, &byte) in bytes.iter().enumerate() {
            let a = addr.as_u32() + i as u32;
            let (_, page) = self
                .pages
                .get_mut(&(a & !(PAGE_SIZE - 1)))
                .unwrap_or_else(|| panic!("test setup writes unmapped {:#x}", a));
            page[(a & (PAGE_SIZE - 1)) as usize] = byte;
        }
    }

    pub fn write_words(&mut self, addr: VirtAddr, words: &[u32]) {
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        self.write(addr, &bytes);
    }

    /// Test inspection: read bytes regardless of page permissions.
    pub fn read(&self, addr: VirtAddr, len: usize) -> Vec<u8> {
        (0..len as u32)
            .map(|i| {
                let a = addr.as_u32() + i;
                let (_, page) = self.slot(a).expect("test reads unmapped memory");
                page[(a & (PAGE_SIZE - 1)) as usize]
            })
            .collect()
    }
}

impl UserMemory for FakeMemory {
    fn translate(&self, page: VirtAddr) -> Option<PageFlags> {
        self.slot(page.as_u32()).map(|(flags, _)| *flags)
    }

    unsafe fn load(&self, addr: VirtAddr, dst: &mut [u8]) {
        for (i, byte) in dst.iter_mut().enumerate() {
            let a = addr.as_u32() + i as u32;
            let (flags, page) = self
                .slot(a)
                .unwrap_or_else(|| panic!("kernel read unvalidated address {:#x}", a));
            assert!(flags.contains(PageFlags::USER_RO), "kernel read supervisor page");
            *byte = page[(a & (PAGE_SIZE - 1)) as usize];
        }
    }

    unsafe fn store(&mut self, addr: VirtAddr, src: &[u8]) {
        for (i, &byte) in src.iter().enumerate() {
            let a = addr.as_u32() + i as u32;
            let (flags, page) = self
                .pages
                .get_mut(&(a & !(PAGE_SIZE - 1)))
                .unwrap_or_else(|| panic!("kernel wrote unvalidated address {:#x}", a));
            assert!(flags.contains(PageFlags::USER_RW), "kernel wrote read-only page");
            page[(a & (PAGE_SIZE - 1)) as usize] = byte;
        }
    }
}

// ---------------------------------------------------------------------------
// Filesystem
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemInode {
    data: Mutex<Vec<u8>>,
    write_denials: AtomicUsize,
}

#[derive(Default)]
struct MemFsState {
    files: Mutex<BTreeMap<String, Arc<MemInode>>>,
    opens: AtomicUsize,
    closes: AtomicUsize,
    busy: AtomicBool,
    overlaps: AtomicUsize,
}

/// Marks the filesystem busy for its lifetime and counts overlapping entries.
struct Entered<'a>(&'a MemFsState);

impl MemFsState {
    fn enter(&self) -> Entered<'_> {
        if self.busy.swap(true, Ordering::AcqRel) {
            self.overlaps.fetch_add(1, Ordering::Relaxed);
        }
        Entered(self)
    }
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        self.0.busy.store(false, Ordering::Release);
    }
}

/// A filesystem that records (instead of tolerating) concurrent entry.
#[derive(Default)]
pub struct MemFs {
    state: Arc<MemFsState>,
}

/// Inspection handle onto a [`MemFs`] after it moved into the kernel.
#[derive(Clone)]
pub struct MemFsView {
    state: Arc<MemFsState>,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> MemFsView {
        MemFsView {
            state: Arc::clone(&self.state),
        }
    }
}

impl MemFsView {
    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        let files = self.state.files.lock().unwrap();
        files.get(name).map(|inode| inode.data.lock().unwrap().clone())
    }

    pub fn set_contents(&self, name: &str, bytes: &[u8]) {
        let inode = MemInode {
            data: Mutex::new(bytes.to_vec()),
            write_denials: AtomicUsize::new(0),
        };
        self.state
            .files
            .lock()
            .unwrap()
            .insert(name.to_string(), Arc::new(inode));
    }

    pub fn exists(&self, name: &str) -> bool {
        self.state.files.lock().unwrap().contains_key(name)
    }

    pub fn opens(&self) -> usize {
        self.state.opens.load(Ordering::Relaxed)
    }

    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::Relaxed)
    }

    /// Number of times the filesystem was entered while already busy.
    pub fn overlaps(&self) -> usize {
        self.state.overlaps.load(Ordering::Relaxed)
    }

    pub fn write_denied(&self, name: &str) -> bool {
        let files = self.state.files.lock().unwrap();
        files
            .get(name)
            .map_or(false, |inode| inode.write_denials.load(Ordering::Relaxed) > 0)
    }
}

impl FileSystem for MemFs {
    fn create(&mut self, name: &str, initial_size: u32) -> bool {
        let _busy = self.state.enter();
        let mut files = self.state.files.lock().unwrap();
        if name.is_empty() || files.contains_key(name) {
            return false;
        }
        let inode = MemInode {
            data: Mutex::new(vec![0; initial_size as usize]),
            write_denials: AtomicUsize::new(0),
        };
        files.insert(name.to_string(), Arc::new(inode));
        true
    }

    fn remove(&mut self, name: &str) -> bool {
        let _busy = self.state.enter();
        self.state.files.lock().unwrap().remove(name).is_some()
    }

    fn open(&mut self, name: &str) -> Option<Box<dyn OpenFile>> {
        let _busy = self.state.enter();
        let inode = self.state.files.lock().unwrap().get(name).cloned()?;
        self.state.opens.fetch_add(1, Ordering::Relaxed);
        Some(Box::new(MemFile {
            inode,
            state: Arc::clone(&self.state),
            pos: 0,
            denying: false,
        }))
    }
}

struct MemFile {
    inode: Arc<MemInode>,
    state: Arc<MemFsState>,
    pos: usize,
    denying: bool,
}

impl OpenFile for MemFile {
    fn length(&mut self) -> u32 {
        let _busy = self.state.enter();
        self.inode.data.lock().unwrap().len() as u32
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        let _busy = self.state.enter();
        let data = self.inode.data.lock().unwrap();
        let available = data.len().saturating_sub(self.pos);
        let count = available.min(buf.len());
        buf[..count].copy_from_slice(&data[self.pos..self.pos + count]);
        self.pos += count;
        count
    }

    /// Byte at a time, yielding in between, to widen any race window.
    fn write(&mut self, buf: &[u8]) -> usize {
        let _busy = self.state.enter();
        if self.inode.write_denials.load(Ordering::Relaxed) > 0 {
            return 0;
        }
        for &byte in buf {
            {
                let mut data = self.inode.data.lock().unwrap();
                if self.pos < data.len() {
                    data[self.pos] = byte;
                } else {
                    data.push(byte);
                }
            }
            self.pos += 1;
            thread::yield_now();
        }
        buf.len()
    }

    fn seek(&mut self, position: u32) {
        let _busy = self.state.enter();
        self.pos = position as usize;
    }

    fn tell(&mut self) -> u32 {
        let _busy = self.state.enter();
        self.pos as u32
    }

    fn deny_write(&mut self) {
        if !self.denying {
            self.denying = true;
            self.inode.write_denials.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn allow_write(&mut self) {
        if self.denying {
            self.denying = false;
            self.inode.write_denials.fetch_sub(1, Ordering::Relaxed);
        }
    }
}

impl Drop for MemFile {
    fn drop(&mut self) {
        self.allow_write();
        self.state.closes.fetch_add(1, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeConsole {
    input: Mutex<VecDeque<u8>>,
    output: Mutex<Vec<u8>>,
}

impl FakeConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(bytes: &[u8]) -> Self {
        let console = Self::new();
        console.push_input(bytes);
        console
    }

    pub fn push_input(&self, bytes: &[u8]) {
        self.input.lock().unwrap().extend(bytes.iter().copied());
    }

    pub fn pending_input(&self) -> usize {
        self.input.lock().unwrap().len()
    }

    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.output.lock().unwrap()).into_owned()
    }
}

impl Console for FakeConsole {
    fn getc(&self) -> u8 {
        self.input
            .lock()
            .unwrap()
            .pop_front()
            .expect("console input exhausted")
    }

    fn putbuf(&self, bytes: &[u8]) {
        self.output.lock().unwrap().extend_from_slice(bytes);
    }
}

#[derive(Default)]
pub struct FakeMachine {
    power_offs: AtomicUsize,
}

impl FakeMachine {
    pub fn power_offs(&self) -> usize {
        self.power_offs.load(Ordering::Relaxed)
    }
}

impl Machine for FakeMachine {
    fn power_off(&self) {
        self.power_offs.fetch_add(1, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Loads executables from the shared filesystem, like a real loader.
///
/// A file whose contents start with `BAD` is not a valid image.
pub struct FakeSpawner {
    fs: Arc<FsLock>,
    started: Mutex<Vec<Arc<Process>>>,
    deferred: AtomicBool,
    out_of_threads: AtomicBool,
    held: Mutex<Vec<SpawnRequest>>,
}

impl FakeSpawner {
    pub fn new(fs: Arc<FsLock>) -> Self {
        Self {
            fs,
            started: Mutex::new(Vec::new()),
            deferred: AtomicBool::new(false),
            out_of_threads: AtomicBool::new(false),
            held: Mutex::new(Vec::new()),
        }
    }

    /// Report load results from another thread after a delay.
    pub fn set_deferred(&self, deferred: bool) {
        self.deferred.store(deferred, Ordering::Relaxed);
    }

    /// Refuse every spawn. Refused requests are kept, so their reporters
    /// stay alive and never report.
    pub fn set_out_of_threads(&self, exhausted: bool) {
        self.out_of_threads.store(exhausted, Ordering::Relaxed);
    }

    /// Requests refused while out of threads.
    pub fn held_requests(&self) -> usize {
        self.held.lock().unwrap().len()
    }

    /// Children whose image loaded.
    pub fn started(&self) -> Vec<Arc<Process>> {
        self.started.lock().unwrap().clone()
    }

    pub fn child(&self, pid: i32) -> Arc<Process> {
        let pid = Pid::from_user(pid).expect("valid pid");
        self.started()
            .into_iter()
            .find(|p| p.pid() == pid)
            .expect("child was started")
    }

    fn load(&self, request: SpawnRequest) {
        let SpawnRequest { child, command, load } = request;
        let loaded = {
            let mut fs = self.fs.lock();
            match fs.open(command.program()) {
                None => Err(LoadError::NotFound),
                Some(mut image) => {
                    let mut magic = [0u8; 3];
                    if image.read(&mut magic) == 3 && &magic == b"BAD" {
                        Err(LoadError::BadImage)
                    } else {
                        child.set_executable(image, &fs);
                        Ok(())
                    }
                }
            }
        };
        match loaded {
            Ok(()) => {
                self.started.lock().unwrap().push(child);
                load.succeed();
            }
            Err(err) => load.fail(err),
        }
    }
}

impl Spawner for Arc<FakeSpawner> {
    fn spawn(&self, request: SpawnRequest) -> Result<(), SpawnError> {
        if self.out_of_threads.load(Ordering::Relaxed) {
            self.held.lock().unwrap().push(request);
            return Err(SpawnError::NoThread);
        }
        if self.deferred.load(Ordering::Relaxed) {
            let spawner = Arc::clone(self);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                spawner.load(request);
            });
        } else {
            self.load(request);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Where every fake process keeps its stack pointer.
pub const ESP: u32 = PHYS_BASE - 256;
/// Start of every fake process's data pages.
pub const DATA: u32 = 0x0804_8000;
/// Data pages mapped read-write.
pub const DATA_PAGES: u32 = 4;
/// Planted in the return slot before each call.
pub const CANARY: u32 = 0xDEAD_BEEF;

/// A kernel wired to in-memory collaborators.
pub struct Harness {
    pub kernel: Arc<Kernel>,
    pub console: Arc<FakeConsole>,
    pub machine: Arc<FakeMachine>,
    pub spawner: Arc<FakeSpawner>,
    pub fs: MemFsView,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(KernelConfig::new())
    }

    pub fn with_config(config: KernelConfig) -> Self {
        let memfs = MemFs::new();
        let view = memfs.view();
        let fs = Arc::new(FsLock::new(Box::new(memfs)));
        let console = Arc::new(FakeConsole::new());
        let machine = Arc::new(FakeMachine::default());
        let spawner = Arc::new(FakeSpawner::new(Arc::clone(&fs)));
        let kernel = Kernel::new(
            config,
            fs,
            console.clone(),
            machine.clone(),
            Arc::new(Arc::clone(&spawner)),
        );
        Self {
            kernel: Arc::new(kernel),
            console,
            machine,
            spawner,
            fs: view,
        }
    }

    /// Make `name` loadable by `exec`.
    pub fn install(&self, name: &str) {
        self.fs.set_contents(name, b"\x7fELF");
    }

    /// The initial process, with a fresh address space.
    pub fn root(&self, name: &str) -> UserProcess {
        UserProcess::new(self.kernel.spawn_root(name))
    }

    /// A started child, with a fresh address space.
    pub fn child(&self, pid: i32) -> UserProcess {
        UserProcess::new(self.spawner.child(pid))
    }
}

/// A process plus an address space to issue syscalls from.
pub struct UserProcess {
    pub process: Arc<Process>,
    pub mem: FakeMemory,
}

impl UserProcess {
    pub fn new(process: Arc<Process>) -> Self {
        let mut mem = FakeMemory::new();
        mem.map(VirtAddr::new(PHYS_BASE - PAGE_SIZE), PageFlags::USER_RW);
        for i in 0..DATA_PAGES {
            mem.map(VirtAddr::new(DATA + i * PAGE_SIZE), PageFlags::USER_RW);
        }
        Self { process, mem }
    }

    pub fn pid(&self) -> i32 {
        self.process.pid().as_i32()
    }

    /// Place a NUL-terminated string in the data pages.
    pub fn string(&mut self, offset: u32, s: &str) -> u32 {
        let addr = DATA + offset;
        let mut bytes = s.as_bytes().to_vec();
        bytes.push(0);
        self.mem.write(VirtAddr::new(addr), &bytes);
        addr
    }

    /// Map `pages` more read-write pages at `base`.
    pub fn map_pages(&mut self, base: u32, pages: u32) {
        for i in 0..pages {
            self.mem.map(VirtAddr::new(base + i * PAGE_SIZE), PageFlags::USER_RW);
        }
    }

    /// Place raw bytes in the data pages.
    pub fn bytes(&mut self, offset: u32, bytes: &[u8]) -> u32 {
        let addr = DATA + offset;
        self.mem.write(VirtAddr::new(addr), bytes);
        addr
    }

    pub fn read_back(&self, addr: u32, len: usize) -> Vec<u8> {
        self.mem.read(VirtAddr::new(addr), len)
    }

    /// Push `nr` and `args` at [`ESP`] and trap.
    pub fn call(&mut self, kernel: &Kernel, nr: u32, args: &[u32]) -> (Disposition, TrapFrame) {
        let mut words = vec![nr];
        words.extend_from_slice(args);
        self.mem.write_words(VirtAddr::new(ESP), &words);
        self.trap(kernel, ESP)
    }

    /// Trap with an arbitrary stack pointer.
    pub fn trap(&mut self, kernel: &Kernel, esp: u32) -> (Disposition, TrapFrame) {
        let mut frame = TrapFrame { esp, eax: CANARY };
        let disposition = kernel.syscall(&self.process, &mut frame, &mut self.mem);
        (disposition, frame)
    }

    /// Call a value-returning syscall that must not terminate the caller.
    pub fn ret(&mut self, kernel: &Kernel, nr: u32, args: &[u32]) -> i32 {
        let (disposition, frame) = self.call(kernel, nr, args);
        assert_eq!(disposition, Disposition::Resume);
        frame.return_value()
    }
}
