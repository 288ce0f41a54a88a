//! Syscall dispatch.
//!
//! The trap layer hands every syscall to [`dispatch_syscall`] with the
//! calling thread and four raw argument words. Handlers validate all
//! user pointers through the caller's address space, never touch raw
//! addresses, and report failures as ABI result codes; the only panic
//! is a syscall arriving on a stopped thread, which indicates a broken
//! trap layer rather than a misbehaving process.

use alloc::boxed::Box;
use alloc::format;
use alloc::sync::Arc;
use alloc::vec;

use sol_hal::Hal;
use sol_vfs::{DirectoryEntry, File, FsNodeKind, DIRENT_WIRE_LEN};
use spin::Mutex;

use crate::error::KernelError;
use crate::kernel::Kernel;
use crate::object::KernelObject;
use crate::process::{Process, Thread, WaitOutcome};
use crate::syscall::{
    pack_list_response, SyscallOutcome, SyscallResult, MAX_PATH_LEN, SYS_ALLOC_MEM, SYS_CLOSE,
    SYS_EXIT, SYS_IOCTL, SYS_JOIN_THREAD, SYS_LIST_DIRECTORY, SYS_OPEN, SYS_POWEROFF, SYS_PREAD,
    SYS_PWRITE, SYS_READ, SYS_SLEEP, SYS_START_PROCESS, SYS_START_THREAD,
    SYS_STOP_CURRENT_THREAD, SYS_WAIT_FOR_PROCESS, SYS_WRITE,
};
use crate::types::{HandleId, ThreadState};

/// Route one syscall from `thread`.
///
/// # Panics
///
/// Panics if `thread` has already stopped. The trap layer owns the
/// invariant that a stopped thread never re-enters the kernel.
pub fn dispatch_syscall<H: Hal>(
    kernel: &Kernel<H>,
    thread: &Arc<Thread>,
    nr: u64,
    args: [u64; 4],
) -> SyscallOutcome {
    if thread.state() == ThreadState::Stopped {
        panic!("syscall {:#x} on stopped thread {}", nr, thread.id().0);
    }
    let process = match thread.owner() {
        Some(p) => p,
        // The owning process is gone; nothing to return to.
        None => return SyscallOutcome::Terminated,
    };

    match nr {
        SYS_EXIT => {
            kernel.hal().debug_write(&format!(
                "[kernel] pid {} exited with code {}",
                process.id().0,
                args[0]
            ));
            process.stop(args[0]);
            SyscallOutcome::Terminated
        }
        SYS_OPEN => complete(sys_open(kernel, &process, args[0])),
        SYS_CLOSE => {
            process.objects().free_object(HandleId(args[0]));
            SyscallOutcome::Complete(SyscallResult::ok(0))
        }
        SYS_READ => complete(sys_read(&process, args, None)),
        SYS_WRITE => complete(sys_write(&process, args, None)),
        SYS_PREAD => complete(sys_read(&process, args, Some(args[3]))),
        SYS_PWRITE => complete(sys_write(&process, args, Some(args[3]))),
        SYS_IOCTL => complete(sys_ioctl(&process, args)),
        SYS_ALLOC_MEM => complete(sys_alloc_mem(&process, args[0])),
        SYS_START_PROCESS => complete(sys_start_process(kernel, &process, args[0], args[1])),
        SYS_WAIT_FOR_PROCESS => sys_wait_for_process(&process, thread, args[0]),
        SYS_START_THREAD => complete(sys_start_thread(kernel, &process, args[0], args[1])),
        SYS_STOP_CURRENT_THREAD => {
            thread.stop(SyscallResult::ok(0));
            SyscallOutcome::Terminated
        }
        SYS_JOIN_THREAD => sys_join_thread(&process, thread, args[0]),
        SYS_SLEEP => {
            if args[0] == 0 {
                return SyscallOutcome::Complete(SyscallResult::ok(0));
            }
            kernel.sleep_thread(thread, args[0]);
            SyscallOutcome::Blocked
        }
        SYS_LIST_DIRECTORY => complete(sys_list_directory(kernel, &process, args)),
        SYS_POWEROFF => complete(sys_poweroff(kernel)),
        _ => {
            kernel
                .hal()
                .debug_write(&format!("[kernel] unknown syscall {:#x}", nr));
            SyscallOutcome::Complete(SyscallResult::from(KernelError::NotSupported))
        }
    }
}

fn complete(result: Result<SyscallResult, KernelError>) -> SyscallOutcome {
    SyscallOutcome::Complete(result.unwrap_or_else(Into::into))
}

fn file_object(
    process: &Arc<Process>,
    handle: u64,
) -> Result<Arc<Mutex<Box<dyn File>>>, KernelError> {
    match process.objects().get_object(HandleId(handle))? {
        KernelObject::File(f) => Ok(f),
        _ => Err(KernelError::NotSupported),
    }
}

fn sys_open<H: Hal>(
    kernel: &Kernel<H>,
    process: &Arc<Process>,
    path_ptr: u64,
) -> Result<SyscallResult, KernelError> {
    let path = process.addrspace().read_cstr(path_ptr, MAX_PATH_LEN)?;
    let file = kernel.vfs().open(&path)?;
    let handle = process.objects().create_file_object(file);
    Ok(SyscallResult::ok(handle.0))
}

fn sys_read(
    process: &Arc<Process>,
    args: [u64; 4],
    offset: Option<u64>,
) -> Result<SyscallResult, KernelError> {
    let [handle, buf_ptr, len, _] = args;
    let file = file_object(process, handle)?;
    // Fail on a bad destination before consuming stream position.
    process.addrspace().check_access(buf_ptr, len, true)?;

    let mut buf = vec![0u8; len as usize];
    let n = {
        let mut file = file.lock();
        match offset {
            Some(off) => file.pread(&mut buf, off)?,
            None => file.read(&mut buf)?,
        }
    };
    process.addrspace().write_bytes(buf_ptr, &buf[..n])?;
    Ok(SyscallResult::ok(n as u64))
}

fn sys_write(
    process: &Arc<Process>,
    args: [u64; 4],
    offset: Option<u64>,
) -> Result<SyscallResult, KernelError> {
    let [handle, buf_ptr, len, _] = args;
    let file = file_object(process, handle)?;
    process.addrspace().check_access(buf_ptr, len, false)?;

    let mut buf = vec![0u8; len as usize];
    process.addrspace().read_bytes(buf_ptr, &mut buf)?;
    let n = {
        let mut file = file.lock();
        match offset {
            Some(off) => file.pwrite(&buf, off)?,
            None => file.write(&buf)?,
        }
    };
    Ok(SyscallResult::ok(n as u64))
}

fn sys_ioctl(process: &Arc<Process>, args: [u64; 4]) -> Result<SyscallResult, KernelError> {
    let [handle, op, arg_ptr, len] = args;
    let file = file_object(process, handle)?;
    if len > 0 {
        process.addrspace().check_access(arg_ptr, len, true)?;
    }

    let mut buf = vec![0u8; len as usize];
    if len > 0 {
        process.addrspace().read_bytes(arg_ptr, &mut buf)?;
    }
    let ret = file.lock().ioctl(op, &mut buf)?;
    if len > 0 {
        process.addrspace().write_bytes(arg_ptr, &buf)?;
    }
    Ok(SyscallResult::ok(ret))
}

fn sys_alloc_mem(process: &Arc<Process>, size: u64) -> Result<SyscallResult, KernelError> {
    let base = process
        .addrspace()
        .alloc_region(size, crate::memory::RegionFlags::read_write(), false)?;
    Ok(SyscallResult::ok(base))
}

fn sys_start_process<H: Hal>(
    kernel: &Kernel<H>,
    process: &Arc<Process>,
    path_ptr: u64,
    args_ptr: u64,
) -> Result<SyscallResult, KernelError> {
    let path = process.addrspace().read_cstr(path_ptr, MAX_PATH_LEN)?;
    let proc_args = if args_ptr == 0 {
        alloc::string::String::new()
    } else {
        process.addrspace().read_cstr(args_ptr, MAX_PATH_LEN)?
    };

    let child = kernel
        .processes()
        .create_process(kernel.vfs(), &path, &proc_args)?;
    kernel.hal().debug_write(&format!(
        "[kernel] pid {} started {} (pid {})",
        process.id().0,
        path,
        child.id().0
    ));
    // Register the handle before anything can run: the caller must hold
    // it by the time the child is observable.
    let handle = process.objects().create_process_object(child.clone());
    child.start();
    Ok(SyscallResult::ok(handle.0))
}

fn sys_wait_for_process(
    process: &Arc<Process>,
    thread: &Arc<Thread>,
    handle: u64,
) -> SyscallOutcome {
    let target = match process.objects().get_object(HandleId(handle)) {
        Ok(KernelObject::Process(p)) => p,
        Ok(_) => return complete(Err(KernelError::NotSupported)),
        Err(e) => return complete(Err(e)),
    };
    match target.wait_for_status_change(thread) {
        WaitOutcome::Ready(result) => SyscallOutcome::Complete(result),
        WaitOutcome::Parked => SyscallOutcome::Blocked,
    }
}

fn sys_start_thread<H: Hal>(
    kernel: &Kernel<H>,
    process: &Arc<Process>,
    entry: u64,
    arg: u64,
) -> Result<SyscallResult, KernelError> {
    let new_thread = kernel.processes().create_thread(process, entry, arg)?;
    let handle = process.objects().create_thread_object(new_thread.clone());
    new_thread.start();
    Ok(SyscallResult::ok(handle.0))
}

fn sys_join_thread(process: &Arc<Process>, thread: &Arc<Thread>, handle: u64) -> SyscallOutcome {
    let target = match process.objects().get_object(HandleId(handle)) {
        Ok(KernelObject::Thread(t)) => t,
        Ok(_) => return complete(Err(KernelError::NotSupported)),
        Err(e) => return complete(Err(e)),
    };
    if target.id() == thread.id() {
        return complete(Err(KernelError::InvalidArgument));
    }
    match target.join(thread) {
        WaitOutcome::Ready(result) => SyscallOutcome::Complete(result),
        WaitOutcome::Parked => SyscallOutcome::Blocked,
    }
}

fn sys_list_directory<H: Hal>(
    kernel: &Kernel<H>,
    process: &Arc<Process>,
    args: [u64; 4],
) -> Result<SyscallResult, KernelError> {
    let [path_ptr, buf_ptr, capacity, _] = args;
    if capacity == 0 {
        return Err(KernelError::InvalidArgument);
    }
    let path = process.addrspace().read_cstr(path_ptr, MAX_PATH_LEN)?;

    let node = kernel.vfs().lookup(&path)?;
    if node.kind() != FsNodeKind::Directory {
        return Err(KernelError::NotSupported);
    }
    // The caller promised `capacity` slots; reject the call before
    // emitting anything if the buffer cannot hold them.
    let span = capacity
        .checked_mul(DIRENT_WIRE_LEN as u64)
        .ok_or(KernelError::InvalidArgument)?;
    process.addrspace().check_access(buf_ptr, span, true)?;

    let children = node.children()?;
    let mut written: u32 = 0;
    let mut skipped = 0usize;
    for child in children.iter() {
        if child.name() == "." || child.name() == ".." {
            skipped += 1;
            continue;
        }
        if u64::from(written) == capacity {
            break;
        }
        let entry = DirectoryEntry::from_node(child.as_ref());
        let addr = buf_ptr + u64::from(written) * DIRENT_WIRE_LEN as u64;
        process.addrspace().write_bytes(addr, &entry.encode())?;
        written += 1;
    }
    let total = children.len() - skipped;
    let has_more = total > written as usize;
    Ok(SyscallResult::ok(pack_list_response(written, has_more)))
}

fn sys_poweroff<H: Hal>(kernel: &Kernel<H>) -> Result<SyscallResult, KernelError> {
    kernel.hal().debug_write("[kernel] poweroff requested");
    kernel.hal().poweroff()?;
    Ok(SyscallResult::ok(0))
}
